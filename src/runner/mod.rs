//! Node ordering and the template walker.
//!
//! Four node kinds participate in ordering: config, variable, resource,
//! output. Dependencies are discovered by collecting the root names of every
//! symbol reference in a node's expressions (resources add their explicit
//! `dependsOn`/`parent` edges the same way, since options are expressions).
//! Name collisions across namespaces and duplicates within one are fatal.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::ast::{
    ConfigEntry, Expr, ExprKind, PropertyEntry, ResourceEntry, TemplateDecl, VariableEntry,
};
use crate::diags::{Diagnostic, Diagnostics};
use crate::syntax::SourceRange;

/// The name of the built-in context variable every program can reference.
pub const BUILTIN_VAR_NAME: &str = "pulumi";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Config,
    Variable,
    Resource,
    Output,
}

impl NodeKind {
    fn label(self) -> &'static str {
        match self {
            NodeKind::Config => "config",
            NodeKind::Variable => "variable",
            NodeKind::Resource => "resource",
            NodeKind::Output => "output",
        }
    }
}

/// A reference to one template node, by kind and index into its decl list.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub index: usize,
    pub name: String,
    pub range: SourceRange,
}

/// The evaluation order for a template.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub nodes: Vec<NodeRef>,
}

struct NodeInfo {
    node: NodeRef,
    deps: Vec<String>,
}

/// Checks names and computes a topological evaluation order. All duplicate,
/// collision, unresolved-reference, and cycle problems are reported into
/// `diags`; a best-effort order is still returned.
pub fn plan(template: &TemplateDecl, diags: &mut Diagnostics) -> Plan {
    let mut nodes: Vec<NodeInfo> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    let mut declare =
        |nodes: &mut Vec<NodeInfo>,
         by_name: &mut HashMap<String, usize>,
         diags: &mut Diagnostics,
         kind: NodeKind,
         index: usize,
         name: &str,
         range: &SourceRange| {
            if let Some(&existing) = by_name.get(name) {
                let existing_kind = nodes[existing].node.kind;
                let summary = if existing_kind == kind {
                    format!("found duplicate {} {}", kind.label(), name)
                } else {
                    format!(
                        "{} {} cannot have the same name as {} {}",
                        kind.label(),
                        name,
                        existing_kind.label(),
                        name
                    )
                };
                diags.push(Diagnostic::error(Some(range.clone()), summary, ""));
                return;
            }
            by_name.insert(name.to_string(), nodes.len());
            nodes.push(NodeInfo {
                node: NodeRef {
                    kind,
                    index,
                    name: name.to_string(),
                    range: range.clone(),
                },
                deps: Vec::new(),
            });
        };

    // Declaration precedence: config first, then resources, then variables.
    // A collision is reported on the weaker declaration.
    for (i, entry) in template.config_entries().enumerate() {
        declare(
            &mut nodes,
            &mut by_name,
            diags,
            NodeKind::Config,
            i,
            &entry.key.value,
            &entry.key.range,
        );
    }
    for (i, entry) in template.resources.iter().enumerate() {
        declare(
            &mut nodes,
            &mut by_name,
            diags,
            NodeKind::Resource,
            i,
            &entry.key.value,
            &entry.key.range,
        );
    }
    for (i, entry) in template.variables.iter().enumerate() {
        declare(
            &mut nodes,
            &mut by_name,
            diags,
            NodeKind::Variable,
            i,
            &entry.key.value,
            &entry.key.range,
        );
    }

    // Outputs export under their own namespace; only duplicates matter.
    let mut output_names: BTreeSet<&str> = BTreeSet::new();
    for (i, entry) in template.outputs.iter().enumerate() {
        if !output_names.insert(&entry.key.value) {
            diags.push(Diagnostic::error(
                Some(entry.key.range.clone()),
                format!("found duplicate output {}", entry.key.value),
                "",
            ));
            continue;
        }
        nodes.push(NodeInfo {
            node: NodeRef {
                kind: NodeKind::Output,
                index: i,
                name: entry.key.value.clone(),
                range: entry.key.range.clone(),
            },
            deps: Vec::new(),
        });
    }

    // Discover dependency edges from symbol roots.
    let node_count = nodes.len();
    for slot in 0..node_count {
        let exprs = node_expressions(template, &nodes[slot].node);
        let mut deps: Vec<String> = Vec::new();
        for expr in exprs {
            collect_symbol_roots(expr, &mut |root, range| {
                if root == BUILTIN_VAR_NAME {
                    return;
                }
                match by_name.get(root) {
                    Some(_) => {
                        if !deps.iter().any(|d| d == root) {
                            deps.push(root.to_string());
                        }
                    }
                    None => diags.push(Diagnostic::error(
                        Some(range.clone()),
                        format!("resource or variable named {:?} could not be found", root),
                        "",
                    )),
                }
            });
        }
        nodes[slot].deps = deps;
    }

    // Topological order with declaration order as tie-break. Outputs come
    // last because they were declared last.
    let mut order: Vec<usize> = Vec::with_capacity(nodes.len());
    let mut state = vec![VisitState::Unvisited; nodes.len()];
    let mut trail: Vec<usize> = Vec::new();
    for slot in 0..nodes.len() {
        visit(
            slot, &nodes, &by_name, &mut state, &mut trail, &mut order, diags,
        );
    }

    let plan = Plan {
        nodes: order.into_iter().map(|slot| nodes[slot].node.clone()).collect(),
    };
    debug!(nodes = plan.nodes.len(), errors = diags.has_errors(), "planned template");
    plan
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    Visiting,
    Done,
}

fn visit(
    slot: usize,
    nodes: &[NodeInfo],
    by_name: &HashMap<String, usize>,
    state: &mut Vec<VisitState>,
    trail: &mut Vec<usize>,
    order: &mut Vec<usize>,
    diags: &mut Diagnostics,
) {
    match state[slot] {
        VisitState::Done => return,
        VisitState::Visiting => {
            let start = trail.iter().position(|&s| s == slot).unwrap_or(0);
            let mut cycle: Vec<&str> =
                trail[start..].iter().map(|&s| nodes[s].node.name.as_str()).collect();
            cycle.push(nodes[slot].node.name.as_str());
            diags.push(Diagnostic::error(
                Some(nodes[slot].node.range.clone()),
                format!("circular reference detected: {}", cycle.join(" -> ")),
                "",
            ));
            return;
        }
        VisitState::Unvisited => {}
    }
    state[slot] = VisitState::Visiting;
    trail.push(slot);
    for dep in &nodes[slot].deps {
        if let Some(&dep_slot) = by_name.get(dep) {
            visit(dep_slot, nodes, by_name, state, trail, order, diags);
        }
    }
    trail.pop();
    state[slot] = VisitState::Done;
    order.push(slot);
}

fn node_expressions<'t>(template: &'t TemplateDecl, node: &NodeRef) -> Vec<&'t Expr> {
    match node.kind {
        NodeKind::Config => {
            let entry = template
                .config_entries()
                .nth(node.index)
                .expect("plan index in range");
            let mut exprs = Vec::new();
            exprs.extend(entry.param.default.iter());
            exprs.extend(entry.param.value.iter());
            exprs
        }
        NodeKind::Variable => vec![&template.variables[node.index].value],
        NodeKind::Resource => template.resources[node.index].decl.expressions(),
        NodeKind::Output => vec![&template.outputs[node.index].value],
    }
}

/// Calls `found` with every symbol root (and its range) in `expr`.
pub fn collect_symbol_roots(expr: &Expr, found: &mut dyn FnMut(&str, &SourceRange)) {
    match &expr.kind {
        ExprKind::Symbol(access) => {
            if let Some(root) = access.root_name() {
                found(root, &expr.range);
            }
        }
        ExprKind::Interpolate(parts) => {
            for part in parts {
                if let Some(access) = &part.access {
                    if let Some(root) = access.root_name() {
                        found(root, &expr.range);
                    }
                }
            }
        }
        ExprKind::List(items) => {
            for item in items {
                collect_symbol_roots(item, found);
            }
        }
        ExprKind::Object(entries) => {
            for entry in entries {
                collect_symbol_roots(&entry.key, found);
                collect_symbol_roots(&entry.value, found);
            }
        }
        ExprKind::Builtin(builtin) => {
            for child in builtin.children() {
                collect_symbol_roots(child, found);
            }
        }
        ExprKind::Null | ExprKind::Boolean(_) | ExprKind::Number(_) | ExprKind::String(_) => {}
    }
}

/// A record of visit hooks: each phase populates only the hooks it needs.
/// Expressions are visited children-first, before their owning node's hook.
#[derive(Default)]
pub struct Walker<'t, C> {
    pub visit_config: Option<Box<dyn FnMut(&mut C, &'t ConfigEntry) + 't>>,
    pub visit_variable: Option<Box<dyn FnMut(&mut C, &'t VariableEntry) + 't>>,
    pub visit_resource: Option<Box<dyn FnMut(&mut C, &'t ResourceEntry) + 't>>,
    pub visit_output: Option<Box<dyn FnMut(&mut C, &'t PropertyEntry) + 't>>,
    pub visit_expr: Option<Box<dyn FnMut(&mut C, &'t Expr) + 't>>,
}

impl<'t, C> Walker<'t, C> {
    pub fn walk(&mut self, ctx: &mut C, template: &'t TemplateDecl, plan: &Plan) {
        for node in &plan.nodes {
            match node.kind {
                NodeKind::Config => {
                    let Some(entry) = template.config_entries().nth(node.index) else {
                        continue;
                    };
                    if let Some(default) = &entry.param.default {
                        self.walk_expr(ctx, default);
                    }
                    if let Some(value) = &entry.param.value {
                        self.walk_expr(ctx, value);
                    }
                    if let Some(hook) = &mut self.visit_config {
                        hook(ctx, entry);
                    }
                }
                NodeKind::Variable => {
                    let entry = &template.variables[node.index];
                    self.walk_expr(ctx, &entry.value);
                    if let Some(hook) = &mut self.visit_variable {
                        hook(ctx, entry);
                    }
                }
                NodeKind::Resource => {
                    let entry = &template.resources[node.index];
                    for expr in entry.decl.expressions() {
                        self.walk_expr(ctx, expr);
                    }
                    if let Some(hook) = &mut self.visit_resource {
                        hook(ctx, entry);
                    }
                }
                NodeKind::Output => {
                    let entry = &template.outputs[node.index];
                    self.walk_expr(ctx, &entry.value);
                    if let Some(hook) = &mut self.visit_output {
                        hook(ctx, entry);
                    }
                }
            }
        }
    }

    fn walk_expr(&mut self, ctx: &mut C, expr: &'t Expr) {
        match &expr.kind {
            ExprKind::List(items) => {
                for item in items {
                    self.walk_expr(ctx, item);
                }
            }
            ExprKind::Object(entries) => {
                for entry in entries {
                    self.walk_expr(ctx, &entry.key);
                    self.walk_expr(ctx, &entry.value);
                }
            }
            ExprKind::Builtin(builtin) => {
                for child in builtin.children() {
                    self.walk_expr(ctx, child);
                }
            }
            _ => {}
        }
        if let Some(hook) = &mut self.visit_expr {
            hook(ctx, expr);
        }
    }
}
