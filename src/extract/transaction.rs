//! Built-in advice for `<tx:annotation-driven/>`.

use tracing::trace;

use super::{AspectDefinitionExtractor, ExtractionContext};
use crate::config::BuildConfig;
use crate::error::ExtractError;
use crate::model::{AdviceKind, AspectDefinition, DefinitionStyle};
use crate::xml::{TX_NAMESPACE, parse_document};

pub const TRANSACTIONAL_ANNOTATION: &str = "org.springframework.transaction.annotation.Transactional";
pub const TRANSACTION_INTERCEPTOR: &str = "org.springframework.transaction.interceptor.TransactionInterceptor";
pub const TRANSACTIONAL_POINTCUT: &str = "@within(org.springframework.transaction.annotation.Transactional) \
     || @annotation(org.springframework.transaction.annotation.Transactional)";

/// Synthesizes an around advice for annotation-driven transactions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionalExtractor;

impl AspectDefinitionExtractor for TransactionalExtractor {
    fn name(&self) -> &'static str {
        "transactional"
    }

    fn enabled(&self, settings: &BuildConfig) -> bool {
        settings.transactional_advice
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Vec<AspectDefinition>, ExtractError> {
        let Some(source) = ctx.config.source.as_deref() else {
            return Ok(Vec::new());
        };
        let root = parse_document(source)?;
        let Some(element) = root
            .descendants()
            .into_iter()
            .find(|e| e.is(TX_NAMESPACE, "annotation-driven"))
        else {
            return Ok(Vec::new());
        };

        let definition = AspectDefinition::advice(
            AdviceKind::Around,
            format!("{TRANSACTION_INTERCEPTOR}#0"),
            TRANSACTION_INTERCEPTOR,
            "invoke",
            ctx.config.artifact.clone(),
        )
        .with_style(DefinitionStyle::Transactional)
        .with_pointcut(TRANSACTIONAL_POINTCUT)
        .with_params(["org.aopalliance.intercept.MethodInvocation"])
        .with_lines(element.lines)
        .with_proxy_target_class(element.attr("proxy-target-class") == Some("true"));
        trace!("[AOP_MODEL] transactional definition {}", definition.describe());
        Ok(vec![definition])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ProjectId;
    use crate::beans::{BeansModel, StaticBeansModel};
    use crate::java::{ClassLoaderSupport, StaticClassPath};
    use std::sync::Arc;

    fn extract(source: &str, settings: &BuildConfig) -> Vec<AspectDefinition> {
        let model = StaticBeansModel::new().with_xml_config("tx.xml", "app", source).unwrap();
        let classes = ClassLoaderSupport::new(ProjectId::new("app"), Arc::new(StaticClassPath::new()));
        let ctx = ExtractionContext::new(model.config(&"tx.xml".into()).unwrap(), &model, &classes, settings);
        if TransactionalExtractor.enabled(settings) {
            TransactionalExtractor.extract(&ctx).unwrap()
        } else {
            Vec::new()
        }
    }

    #[test]
    fn test_annotation_driven_yields_around_advice() {
        let source = r#"<beans xmlns="http://www.springframework.org/schema/beans"
    xmlns:tx="http://www.springframework.org/schema/tx">
  <tx:annotation-driven proxy-target-class="true"/>
</beans>"#;
        let defs = extract(source, &BuildConfig::default());
        assert_eq!(defs.len(), 1);
        let def = &defs[0];
        assert_eq!(def.kind, AdviceKind::Around);
        assert_eq!(def.style, DefinitionStyle::Transactional);
        assert_eq!(def.aspect_class, TRANSACTION_INTERCEPTOR);
        assert!(def.aspect_name.ends_with("#0"));
        assert!(def.proxy_target_class);
        assert_eq!(def.start_line(), 3);
    }

    #[test]
    fn test_disabled_or_absent() {
        let with_tx = r#"<beans xmlns:tx="http://www.springframework.org/schema/tx"><tx:annotation-driven/></beans>"#;
        let settings = BuildConfig::default().with_transactional_advice(false);
        assert!(extract(with_tx, &settings).is_empty());
        assert!(extract("<beans/>", &BuildConfig::default()).is_empty());
    }
}
