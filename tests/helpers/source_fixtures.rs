//! Common configuration sources and class paths for tests.

use weave::java::{Annotation, JavaClass, JavaMethod, Modifiers, StaticClassPath};

pub const BEANS_HEADER: &str = r#"<beans xmlns="http://www.springframework.org/schema/beans"
       xmlns:aop="http://www.springframework.org/schema/aop"
       xmlns:tx="http://www.springframework.org/schema/tx">"#;

/// Wrap `body` in a `<beans>` root declaring the aop and tx namespaces.
///
/// The header takes three lines, so the first body line is line 4.
pub fn beans(body: &str) -> String {
    format!("{BEANS_HEADER}\n{body}\n</beans>\n")
}

/// A logging aspect with before-advice on every `com.acme.Service` method.
/// The `<aop:before>` element is on line 8.
pub fn xml_before_advice(pointcut: &str) -> String {
    beans(&format!(
        r#"  <bean id="logger" class="com.acme.Logger"/>
  <bean id="service" class="com.acme.Service"/>
  <aop:config>
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="{pointcut}"/>
    </aop:aspect>
  </aop:config>"#
    ))
}

/// Only the aspect; the beans it advises live elsewhere.
pub fn xml_aspect_only(pointcut: &str) -> String {
    beans(&format!(
        r#"  <bean id="logger" class="com.acme.Logger"/>
  <aop:config>
    <aop:aspect ref="logger">
      <aop:before method="log" pointcut="{pointcut}"/>
    </aop:aspect>
  </aop:config>"#
    ))
}

pub fn xml_service_only() -> String {
    beans(r#"  <bean id="service" class="com.acme.Service"/>"#)
}

pub const SERVICE_POINTCUT: &str = "execution(* com.acme.Service.*(..))";

/// `Logger.log()`, `Service.doWork()` and an unrelated `Repository`.
pub fn acme_classes() -> StaticClassPath {
    StaticClassPath::new()
        .with_class(JavaClass::new("com.acme.Logger").with_method(JavaMethod::new("log")))
        .with_class(JavaClass::new("com.acme.Service").with_method(JavaMethod::new("doWork")))
        .with_class(JavaClass::new("com.acme.Repository").with_method(JavaMethod::new("save")))
}

/// `Service` is final.
pub fn final_service_classes() -> StaticClassPath {
    StaticClassPath::new()
        .with_class(JavaClass::new("com.acme.Logger").with_method(JavaMethod::new("log")))
        .with_class(
            JavaClass::new("com.acme.Service")
                .with_modifiers(Modifiers::PUBLIC | Modifiers::FINAL)
                .with_method(JavaMethod::new("doWork")),
        )
}

/// `Service implements Api`; only `call()` is declared by the interface.
pub fn interface_classes() -> StaticClassPath {
    StaticClassPath::new()
        .with_class(JavaClass::new("com.acme.Logger").with_method(JavaMethod::new("log")))
        .with_class(JavaClass::interface("com.acme.Api").with_method(JavaMethod::new("call")))
        .with_class(
            JavaClass::new("com.acme.Service")
                .implementing("com.acme.Api")
                .with_method(JavaMethod::new("call"))
                .with_method(JavaMethod::new("doWork")),
        )
}

/// An `@Aspect` class advising `Service` before every method.
pub fn annotated_aspect_classes() -> StaticClassPath {
    acme_classes().with_class(
        JavaClass::new("com.acme.Audit")
            .annotated(Annotation::new("org.aspectj.lang.annotation.Aspect"))
            .with_method(
                JavaMethod::new("audit").annotated(
                    Annotation::new("org.aspectj.lang.annotation.Before").with("value", SERVICE_POINTCUT),
                ),
            ),
    )
}
