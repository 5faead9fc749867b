use std::sync::Arc;

use metapath_engine::{
    DynamicContext, EvaluationConfig, Expr, Item, MetapathError, NodeItem, Sequence,
    StaticContext, build, evaluate, parse,
};

/// A compiled Metapath expression: the source text, its AST and the static
/// context it was compiled against.
///
/// Compiled expressions hold no tree references and can be shared between
/// threads and evaluated against any number of trees.
#[derive(Debug, Clone)]
pub struct MetapathExpression {
    text: String,
    expr: Expr,
    static_context: Arc<StaticContext>,
}

impl MetapathExpression {
    /// Parses and builds `text`.
    ///
    /// # Errors
    ///
    /// Returns `MetapathError::SyntaxError` if `text` is not a valid
    /// expression.
    pub fn compile(text: &str, static_context: &StaticContext) -> Result<Self, MetapathError> {
        Self::compile_shared(text, Arc::new(static_context.clone()))
    }

    pub(crate) fn compile_shared(
        text: &str,
        static_context: Arc<StaticContext>,
    ) -> Result<Self, MetapathError> {
        let tree = parse(text)?;
        let expr = build(&tree)?;
        Ok(Self {
            text: text.to_string(),
            expr,
            static_context,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_context
    }

    /// A fresh dynamic context sharing this expression's static context.
    pub fn dynamic_context<'t>(&self, config: EvaluationConfig) -> DynamicContext<'t> {
        DynamicContext::from_shared(Arc::clone(&self.static_context), Arc::new(config))
    }

    pub fn evaluate<'t>(
        &self,
        focus: Option<Item<'t>>,
        ctx: &DynamicContext<'t>,
    ) -> Result<Sequence<'t>, MetapathError> {
        evaluate(&self.expr, ctx, focus)
    }

    /// Evaluates to the effective boolean value of the result.
    pub fn evaluate_as_boolean<'t>(
        &self,
        focus: Option<Item<'t>>,
        ctx: &DynamicContext<'t>,
    ) -> Result<bool, MetapathError> {
        self.evaluate(focus, ctx)?.effective_boolean_value()
    }

    /// Evaluates to the string value of a single item; an empty result is the
    /// empty string.
    pub fn evaluate_as_string<'t>(
        &self,
        focus: Option<Item<'t>>,
        ctx: &DynamicContext<'t>,
    ) -> Result<String, MetapathError> {
        let result = self.evaluate(focus, ctx)?;
        match result.zero_or_one(&self.text)? {
            Some(item) => item.string_value(),
            None => Ok(String::new()),
        }
    }

    /// Evaluates to a node sequence. Any non-node item is a type error.
    pub fn evaluate_as_nodes<'t>(
        &self,
        focus: Option<Item<'t>>,
        ctx: &DynamicContext<'t>,
    ) -> Result<Vec<NodeItem<'t>>, MetapathError> {
        self.evaluate(focus, ctx)?.nodes(&self.text)
    }

    /// Evaluates to at most one item.
    pub fn evaluate_as_single<'t>(
        &self,
        focus: Option<Item<'t>>,
        ctx: &DynamicContext<'t>,
    ) -> Result<Option<Item<'t>>, MetapathError> {
        let result = self.evaluate(focus, ctx)?;
        Ok(result.zero_or_one(&self.text)?.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metapath_engine::{AtomicItem, NodeItemTree, QName};
    use metapath_nodeitem::TreeBuilder;

    fn tree() -> NodeItemTree {
        let mut builder = TreeBuilder::document(QName::local("root"));
        let root = builder.root();
        builder.add_field(root, QName::local("field1"), "one".into()).unwrap();
        let field2 = builder.add_field(root, QName::local("field2"), "two".into()).unwrap();
        builder.add_flag(field2, "flag", "yes".into()).unwrap();
        builder.build()
    }

    fn compile(text: &str) -> MetapathExpression {
        MetapathExpression::compile(text, &StaticContext::default()).unwrap()
    }

    #[test]
    fn test_compile_keeps_source_text() {
        let expr = compile("1 + 2");
        assert_eq!(expr.text(), "1 + 2");
        assert!(matches!(expr.expr(), Expr::Arithmetic { .. }));
    }

    #[test]
    fn test_compile_rejects_bad_syntax() {
        let err = MetapathExpression::compile("@flag +", &StaticContext::default()).unwrap_err();
        assert!(matches!(err, MetapathError::SyntaxError { .. }));
    }

    #[test]
    fn test_typed_helpers() {
        let tree = tree();
        let doc = Some(Item::Node(tree.root()));
        let ctx = compile(".").dynamic_context(EvaluationConfig::default());

        assert!(compile("/root/field2/@flag").evaluate_as_boolean(doc.clone(), &ctx).unwrap());
        assert!(!compile("/root/missing").evaluate_as_boolean(doc.clone(), &ctx).unwrap());
        assert_eq!(
            compile("/root/field1").evaluate_as_string(doc.clone(), &ctx).unwrap(),
            "one"
        );
        assert_eq!(compile("()").evaluate_as_string(None, &ctx).unwrap(), "");
        assert_eq!(compile("/root/*").evaluate_as_nodes(doc.clone(), &ctx).unwrap().len(), 2);
        assert_eq!(
            compile("1 + 1").evaluate_as_single(None, &ctx).unwrap(),
            Some(Item::Atomic(AtomicItem::Integer(2)))
        );
    }

    #[test]
    fn test_typed_helpers_reject_wrong_shape() {
        let tree = tree();
        let doc = Some(Item::Node(tree.root()));
        let ctx = DynamicContext::new(StaticContext::default());

        assert!(matches!(
            compile("/root/*").evaluate_as_string(doc.clone(), &ctx),
            Err(MetapathError::TypeError(_))
        ));
        assert!(matches!(
            compile("(/root, 1)").evaluate_as_nodes(doc.clone(), &ctx),
            Err(MetapathError::TypeError(_))
        ));
        assert!(matches!(
            compile("(1, 2)").evaluate_as_boolean(None, &ctx),
            Err(MetapathError::TypeError(_))
        ));
        assert!(matches!(
            compile("(1, 2)").evaluate_as_single(None, &ctx),
            Err(MetapathError::TypeError(_))
        ));
    }
}
