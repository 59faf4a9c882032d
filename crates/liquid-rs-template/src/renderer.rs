//! The tree-walking renderer.
//!
//! A [`Renderer`] owns all per-render state: the output buffer, the scope
//! stack, the control-flag register and the list of recovered errors. It
//! also owns the long-lived pieces that `include` and filter pipes need: the
//! registered templates, the loaders, and the filter registry.
//!
//! Evaluation errors unwind to [`Renderer::render`], which records them and
//! writes an inline `{! ... !}` marker; `render` itself never fails.

use std::collections::HashMap;
use std::sync::Arc;

use liquid_rs_core::error::{ErrorOrigin, EvaluationError, LiquidError};
use liquid_rs_core::logging::render_span;
use liquid_rs_core::settings::Settings;
use tracing::{debug, trace, warn};

use crate::context::{Context, Flags, Scope, ScopeKind};
use crate::filters::FilterRegistry;
use crate::loaders::{FileSystemLoader, TemplateLoader};
use crate::nodes::{AssignTarget, BinaryOperator, Expr, IfBlock, Node, Tag, TagNode};
use crate::parser::ParserOptions;
use crate::template::Template;
use crate::value::{compare, Object, Value};

/// Host customization points.
///
/// Every method has a default, so `impl RenderHooks for MyHooks {}` is a
/// valid starting point.
pub trait RenderHooks {
    /// Converts an expression result to output text.
    fn stringify(&self, value: &Value) -> String {
        value.to_display_string()
    }

    /// Formats the inline marker written when a render is aborted.
    ///
    /// `template` is the top-level template. Errors raised inside an included
    /// template carry their own location in `error.origin`.
    fn error_marker(&self, template: &Template, error: &EvaluationError) -> String {
        match (&error.origin, error.offset) {
            (Some(origin), _) => format!(
                "{{! {}:{}:{}: {} !}}",
                origin.template, origin.line, origin.column, error.message
            ),
            (None, Some(offset)) => {
                let (line, column) = template.line_col(offset);
                format!("{{! {line}:{column}: {} !}}", error.message)
            }
            (None, None) => format!("{{! {} !}}", error.message),
        }
    }

    /// Adds host filters to a new renderer's registry.
    fn register_filters(&self, _filters: &mut FilterRegistry) {}
}

/// Hooks with every default behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl RenderHooks for DefaultHooks {}

/// Renderer behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererOptions {
    /// Write `{! ... !}` markers into the output on evaluation errors.
    pub error_markers: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            error_markers: true,
        }
    }
}

impl From<&Settings> for RendererOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            error_markers: settings.error_markers,
        }
    }
}

type EvalResult<T> = Result<T, EvaluationError>;

/// Renders templates against data.
///
/// A renderer may be reused for any number of sequential renders; each call
/// to [`render`](Self::render) starts from a clean state. Registered
/// templates and loaded includes are kept across calls.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::renderer::Renderer;
/// use liquid_rs_template::template::parse;
/// use liquid_rs_template::value::Object;
///
/// let mut renderer = Renderer::new();
/// renderer.register_template("greet", parse("Hi {{ include.who }}", None).unwrap());
///
/// let page = parse("{% include greet with who = 'Bob' %}!", None).unwrap();
/// assert_eq!(renderer.render(&page, Object::new()), "Hi Bob!");
/// assert!(renderer.errors().is_empty());
/// ```
pub struct Renderer<H: RenderHooks = DefaultHooks> {
    hooks: H,
    options: RendererOptions,
    context: Context,
    output: String,
    errors: Vec<EvaluationError>,
    templates: HashMap<String, Arc<Template>>,
    loaders: Vec<Box<dyn TemplateLoader>>,
    filters: FilterRegistry,
}

impl Renderer<DefaultHooks> {
    /// Creates a renderer with default hooks and options.
    pub fn new() -> Self {
        Self::with_hooks(DefaultHooks)
    }

    /// Creates a renderer configured from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new().with_settings(settings)
    }
}

impl Default for Renderer<DefaultHooks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RenderHooks> Renderer<H> {
    /// Creates a renderer using `hooks`.
    pub fn with_hooks(hooks: H) -> Self {
        let mut filters = FilterRegistry::with_builtins();
        hooks.register_filters(&mut filters);

        Self {
            hooks,
            options: RendererOptions::default(),
            context: Context::new(),
            output: String::new(),
            errors: Vec::new(),
            templates: HashMap::new(),
            loaders: Vec::new(),
            filters,
        }
    }

    /// Applies `settings`: renderer options, plus a filesystem loader over
    /// the configured template directories.
    #[must_use]
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.options = RendererOptions::from(settings);
        if !settings.template_dirs.is_empty() {
            self.add_loader(FileSystemLoader::with_options(
                settings.template_dirs.clone(),
                ParserOptions::from(settings),
            ));
        }
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RendererOptions) -> Self {
        self.options = options;
        self
    }

    /// Makes `template` available to `include` under `name`.
    pub fn register_template(&mut self, name: impl Into<String>, template: Template) {
        self.templates.insert(name.into(), Arc::new(template));
    }

    /// Appends a loader consulted when an include name is not registered.
    pub fn add_loader(&mut self, loader: impl TemplateLoader + 'static) {
        self.loaders.push(Box::new(loader));
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Errors recovered during the last render.
    pub fn errors(&self) -> &[EvaluationError] {
        &self.errors
    }

    /// The global frame as left by the last render, including any
    /// `assign ... global` writes.
    pub fn globals(&self) -> Option<&Object> {
        self.context.globals()
    }

    fn reset(&mut self) {
        self.output.clear();
        self.errors.clear();
        self.context.reset();
    }

    /// Renders `template` with `data` as the global frame.
    pub fn render(&mut self, template: &Template, data: Object) -> String {
        let span = render_span(&template.name());
        let _enter = span.enter();

        self.reset();
        self.context.push_with(ScopeKind::Global, data);
        self.context.push(ScopeKind::FileScope);

        if let Err(err) = self.process_nodes(template.nodes()) {
            self.recover(template, err);
        }

        if self.context.flags().contains(Flags::DISCARD) {
            self.output.clear();
        }
        self.context.clear_flags();
        self.context.truncate(1);

        debug!(
            output_len = self.output.len(),
            errors = self.errors.len(),
            "render finished"
        );

        std::mem::take(&mut self.output)
    }

    fn recover(&mut self, template: &Template, err: EvaluationError) {
        warn!(error = %err, "evaluation error recovered");
        if self.options.error_markers {
            let marker = self.hooks.error_marker(template, &err);
            self.output.push_str(&marker);
        }
        self.errors.push(err);
    }

    // ── node processing ──────────────────────────────────────────────────

    /// Processes `nodes` in order, stopping as soon as any flag is raised.
    fn process_nodes(&mut self, nodes: &[Node]) -> EvalResult<()> {
        for node in nodes {
            self.process(node)?;
            if !self.context.flags().is_empty() {
                break;
            }
        }
        Ok(())
    }

    fn process(&mut self, node: &Node) -> EvalResult<()> {
        match node {
            Node::Text(text) => self.output.push_str(&text.text),
            Node::Expression(expr) => {
                let value = self.eval(expr)?;
                let text = self.hooks.stringify(&value);
                self.output.push_str(&text);
            }
            Node::Tag(tag) => self.visit_tag(tag)?,
        }
        Ok(())
    }

    fn visit_tag(&mut self, node: &TagNode) -> EvalResult<()> {
        match &node.tag {
            Tag::Assign {
                name,
                value,
                target,
            } => self.visit_assign(name, value, *target),
            Tag::Capture { name, body } => self.visit_capture(name, body),
            Tag::For {
                variable,
                iterable,
                body,
            } => self.visit_for(variable, iterable, body),
            Tag::If { blocks } => self.visit_if(blocks),
            Tag::Break => {
                self.context.raise(Flags::BREAK);
                Ok(())
            }
            Tag::Continue => {
                self.context.raise(Flags::CONTINUE);
                Ok(())
            }
            Tag::Eject => {
                self.context.raise(Flags::EJECT);
                Ok(())
            }
            Tag::Discard => {
                self.context.raise(Flags::DISCARD);
                Ok(())
            }
            Tag::Include { name, args } => self.visit_include(name, args, node.offset),
            Tag::Comment => Ok(()),
            Tag::Newline => {
                self.output.push('\n');
                Ok(())
            }
        }
    }

    fn visit_assign(&mut self, name: &str, value: &Expr, target: AssignTarget) -> EvalResult<()> {
        let value = self.eval(value)?;
        let frame = match target {
            AssignTarget::Local => self.context.current_file_scope_mut(),
            AssignTarget::ParentScope if self.context.has_parent_file_scope() => {
                self.context.parent_file_scope_mut()
            }
            AssignTarget::ParentScope | AssignTarget::Global => self.context.global_mut(),
        }
        .map_err(scope_error)?;
        frame.insert(name.to_string(), value);
        Ok(())
    }

    fn visit_capture(&mut self, name: &str, body: &[Node]) -> EvalResult<()> {
        let start = self.output.len();
        {
            let mut scope = Scope::enter(self, ScopeKind::ControlBlock);
            scope.process_nodes(body)?;
        }
        let captured = self.output.split_off(start);
        self.context
            .current_file_scope_mut()
            .map_err(scope_error)?
            .insert(name.to_string(), Value::String(captured));
        Ok(())
    }

    fn visit_for(&mut self, variable: &str, iterable: &Expr, body: &[Node]) -> EvalResult<()> {
        let iterable = self.eval(iterable)?;
        let items = match (iterable.to_array(), iterable.property_names()) {
            (Some(items), _) => items,
            (None, Some(keys)) => keys.into_iter().map(Value::String).collect(),
            (None, None) => return Ok(()),
        };

        let length = items.len();
        let mut scope = Scope::enter(self, ScopeKind::ControlBlock);

        for (index, item) in items.into_iter().enumerate() {
            let mut forloop = Object::new();
            forloop.insert("index".into(), Value::from(index));
            forloop.insert("first".into(), Value::Bool(index == 0));
            forloop.insert("last".into(), Value::Bool(index + 1 == length));
            forloop.insert("length".into(), Value::from(length));

            scope
                .context
                .set("forloop", Value::Map(forloop))
                .map_err(scope_error)?;
            scope.context.set(variable, item).map_err(scope_error)?;

            scope.process_nodes(body)?;

            let flags = scope.context.flags();
            if flags.intersects(Flags::BREAK | Flags::CONTINUE) {
                scope.context.clear_flags();
                if flags.contains(Flags::BREAK) {
                    return Ok(());
                }
            } else if flags.contains(Flags::EJECT) {
                return Ok(());
            }
        }

        Ok(())
    }

    fn visit_if(&mut self, blocks: &[IfBlock]) -> EvalResult<()> {
        for block in blocks {
            if self.eval(&block.condition)?.is_truthy() {
                return self.process_nodes(&block.body);
            }
        }
        Ok(())
    }

    fn visit_include(&mut self, name: &str, args: &[(String, Expr)], offset: usize) -> EvalResult<()> {
        let mut include = Object::new();
        include.insert("__".into(), Value::Bool(true));
        for (key, expr) in args {
            include.insert(key.clone(), self.eval(expr)?);
        }

        let template = self.resolve_template(name, offset)?;
        trace!(template = %name, args = args.len(), "include");

        let result = {
            let mut scope = Scope::enter(self, ScopeKind::FileScope);
            scope
                .context
                .set("include", Value::Map(include))
                .map_err(scope_error)?;
            scope.process_nodes(template.nodes())
        };

        result.map_err(|err| match err.offset {
            Some(offset) if err.origin.is_none() => {
                let (line, column) = template.line_col(offset);
                let origin = ErrorOrigin {
                    template: template
                        .path()
                        .map_or_else(|| name.to_string(), |p| p.display().to_string()),
                    line,
                    column,
                };
                err.with_origin(origin)
            }
            _ => err,
        })
    }

    fn resolve_template(&mut self, name: &str, offset: usize) -> EvalResult<Arc<Template>> {
        if let Some(template) = self.templates.get(name) {
            return Ok(Arc::clone(template));
        }

        for loader in &self.loaders {
            match loader.load(name) {
                Ok(template) => {
                    let template = Arc::new(template);
                    self.templates.insert(name.to_string(), Arc::clone(&template));
                    return Ok(template);
                }
                Err(LiquidError::TemplateDoesNotExist(_)) => {}
                Err(err) => {
                    return Err(EvaluationError::at(
                        format!("Could not load template '{name}': {err}"),
                        offset,
                    ));
                }
            }
        }

        Err(EvaluationError::at(
            format!("No template named '{name}'"),
            offset,
        ))
    }

    // ── expression evaluation ────────────────────────────────────────────

    fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::ArrayLiteral { items, .. } => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Array),
            Expr::Variable { name, .. } => Ok(self.context.lookup(name).cloned().unwrap_or_default()),
            Expr::MemberAccess { target, name, .. } => {
                let value = self.eval(target)?;
                member_access(&value, name, target.offset())
            }
            Expr::ArrayAccess { target, index, .. } => {
                let value = self.eval(target)?;
                let key = self.eval(index)?;
                match key {
                    Value::Int(i) if value.is_array() => Ok(value.at(i)),
                    Value::Int(_) => {
                        Err(EvaluationError::at("Value is not an array", target.offset()))
                    }
                    Value::String(k) if value.is_map() => Ok(value.property(&k)),
                    Value::String(_) => {
                        Err(EvaluationError::at("Value is not an object", target.offset()))
                    }
                    _ => Err(EvaluationError::at(
                        "Index must be a 'string' or an 'int'",
                        index.offset(),
                    )),
                }
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                offset,
            } => self.eval_binary(*op, lhs, rhs, *offset),
            Expr::Not { operand, .. } => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::Pipe {
                target,
                filter,
                args,
                offset,
            } => {
                let value = self.eval(target)?;
                self.filters
                    .apply(filter, &value, args)
                    .map_err(|err| err.with_offset(*offset))
            }
        }
    }

    fn eval_binary(&self, op: BinaryOperator, lhs: &Expr, rhs: &Expr, offset: usize) -> EvalResult<Value> {
        use std::cmp::Ordering;

        let result = match op {
            BinaryOperator::Or => self.eval(lhs)?.is_truthy() || self.eval(rhs)?.is_truthy(),
            BinaryOperator::And => self.eval(lhs)?.is_truthy() && self.eval(rhs)?.is_truthy(),
            BinaryOperator::Xor => self.eval(lhs)?.is_truthy() != self.eval(rhs)?.is_truthy(),
            BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div => {
                return arithmetic(op, self.eval(lhs)?, self.eval(rhs)?, offset);
            }
            _ => {
                let ordering = compare(&self.eval(lhs)?, &self.eval(rhs)?);
                match op {
                    BinaryOperator::Less => ordering == Ordering::Less,
                    BinaryOperator::Leq => ordering != Ordering::Greater,
                    BinaryOperator::Greater => ordering == Ordering::Greater,
                    BinaryOperator::Geq => ordering != Ordering::Less,
                    BinaryOperator::Equal => ordering == Ordering::Equal,
                    _ => ordering != Ordering::Equal,
                }
            }
        };
        Ok(Value::Bool(result))
    }
}

impl<H: RenderHooks> AsMut<Context> for Renderer<H> {
    fn as_mut(&mut self) -> &mut Context {
        &mut self.context
    }
}

fn scope_error(err: LiquidError) -> EvaluationError {
    EvaluationError::new(err.to_string())
}

fn count(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

fn member_access(value: &Value, name: &str, target_offset: usize) -> EvalResult<Value> {
    let is_size = name == "size" || name == "length";
    match value {
        v if v.is_array() => Ok(match v.length() {
            Some(len) if is_size => count(len),
            _ => Value::Null,
        }),
        v if v.is_map() => Ok(v.property(name)),
        Value::String(s) if is_size => Ok(count(s.chars().count())),
        Value::String(_) => Ok(Value::Null),
        _ => Err(EvaluationError::at(
            "Value does not support member access",
            target_offset,
        )),
    }
}

fn arithmetic(op: BinaryOperator, lhs: Value, rhs: Value, offset: usize) -> EvalResult<Value> {
    let unsupported = |lhs: &Value, rhs: &Value| {
        EvaluationError::at(
            format!(
                "Unsupported operand types for '{}': '{}' and '{}'",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ),
            offset,
        )
    };

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOperator::Add => a.checked_add(b),
                BinaryOperator::Sub => a.checked_sub(b),
                BinaryOperator::Mul => a.checked_mul(b),
                _ if b == 0 => return Err(EvaluationError::at("Division by zero", offset)),
                _ => a.checked_div(b),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| EvaluationError::at("Integer overflow", offset))
        }
        (Value::String(mut a), Value::String(b)) if op == BinaryOperator::Add => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::Array(mut a), Value::Array(b)) if op == BinaryOperator::Add => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (lhs, rhs) => {
            let (Some(a), Some(b)) = (lhs.as_double(), rhs.as_double()) else {
                return Err(unsupported(&lhs, &rhs));
            };
            match op {
                BinaryOperator::Add => Ok(Value::Double(a + b)),
                BinaryOperator::Sub => Ok(Value::Double(a - b)),
                BinaryOperator::Mul => Ok(Value::Double(a * b)),
                _ if b == 0.0 => Err(EvaluationError::at("Division by zero", offset)),
                _ => Ok(Value::Double(a / b)),
            }
        }
    }
}
