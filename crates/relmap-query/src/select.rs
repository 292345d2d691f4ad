//! Joined SELECT assembly.
//!
//! A [`SelectPlan`] is the join tree of one query. The same tree renders the
//! column list and join clauses and later drives row marshaling, so the
//! `<table>_<column>` aliases the marshaler reads are exactly the ones the
//! statement selected.
//!
//! Every entity type appears at most once per plan. A relationship whose
//! target is already present is not joined; the marshaler resolves it from
//! the foreign-key column or the in-progress ancestor instead.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use relmap_core::{
    CascadeType, ColumnMeta, Dialect, Entity, EntityMeta, Error, Result, Role, Value, resolve,
};

use crate::statement::Statement;

/// How a child node is attached to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    /// The parent is the inverse side; the child table holds the key.
    Inverse,
    /// The parent owns the key; the child is the referenced table.
    Owning,
}

/// A node of the join tree.
#[derive(Debug)]
pub struct PlanNode {
    pub meta: Arc<EntityMeta>,
    /// Relationship field on the parent this node was joined through.
    pub via: Option<&'static str>,
    pub side: Option<JoinSide>,
    /// Rendered `LEFT JOIN ... ON ...` clause; `None` for the root.
    pub join: Option<String>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    fn root(meta: Arc<EntityMeta>) -> Self {
        Self {
            meta,
            via: None,
            side: None,
            join: None,
            children: Vec::new(),
        }
    }

    /// Child joined through the parent's field `field`.
    pub fn child(&self, field: &str) -> Option<&PlanNode> {
        self.children.iter().find(|c| c.via == Some(field))
    }

    /// Result alias of `column` on this node's table.
    pub fn alias(&self, column: &ColumnMeta) -> String {
        column_alias(&self.meta, &column.name)
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a PlanNode>) {
        out.push(self);
        for child in &self.children {
            child.visit(out);
        }
    }
}

/// `<table>_<column>`.
pub fn column_alias(meta: &EntityMeta, column: &str) -> String {
    format!("{}_{}", meta.table_name(), column)
}

/// The join tree of a SELECT rooted at one entity type.
#[derive(Debug)]
pub struct SelectPlan {
    pub root: PlanNode,
}

impl SelectPlan {
    /// Build the plan for `E`.
    pub fn for_entity<E: Entity>() -> Result<Self> {
        Self::new(resolve::<E>()?)
    }

    /// Build the plan rooted at `meta`.
    pub fn new(meta: Arc<EntityMeta>) -> Result<Self> {
        let mut present = HashSet::new();
        present.insert(meta.type_id);
        let mut root = PlanNode::root(meta);
        expand(&mut root, &mut present)?;
        Ok(Self { root })
    }

    /// Nodes in render order (pre-order).
    pub fn nodes(&self) -> Vec<&PlanNode> {
        let mut out = Vec::new();
        self.root.visit(&mut out);
        out
    }

    /// `SELECT <columns> FROM <root> <joins>`
    pub fn sql(&self) -> String {
        let nodes = self.nodes();
        let columns: Vec<String> = nodes
            .iter()
            .flat_map(|node| {
                node.meta.columns.iter().map(move |c| {
                    format!("{}.{} AS {}", node.meta.table_name(), c.name, node.alias(c))
                })
            })
            .collect();

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            self.root.meta.qualified_table()
        );
        for join in nodes.iter().filter_map(|n| n.join.as_deref()) {
            sql.push(' ');
            sql.push_str(join);
        }
        sql
    }

    /// The unfiltered SELECT used by `find_all`.
    pub fn select_all(&self) -> Statement {
        Statement::new(self.sql(), Vec::new())
    }

    /// The SELECT filtered by the root identity, used by `find_by_id`.
    pub fn select_by_id(&self, id: i64, dialect: Dialect) -> Result<Statement> {
        let pk = self.root.meta.primary_key_column()?;
        let sql = format!(
            "{} WHERE {}.{} = {}",
            self.sql(),
            self.root.meta.table_name(),
            pk,
            dialect.placeholder(1)
        );
        Ok(Statement::new(sql, vec![Value::BigInt(id)]))
    }
}

/// Attach inverse children (cascade GET), then owning children, then recurse.
fn expand(node: &mut PlanNode, present: &mut HashSet<TypeId>) -> Result<()> {
    let parent = Arc::clone(&node.meta);

    for rel in parent.inverse() {
        if !rel.cascade.propagates(CascadeType::Get) || !present.insert(rel.target_type) {
            continue;
        }
        let Role::Inverse {
            owner_column,
            referenced_column,
            ..
        } = &rel.role
        else {
            continue;
        };
        let child = rel.target_meta()?;
        let join = format!(
            "LEFT JOIN {} ON {}.{} = {}.{}",
            child.qualified_table(),
            parent.table_name(),
            referenced_column,
            child.table_name(),
            owner_column
        );
        node.children.push(joined(child, rel.field, JoinSide::Inverse, join));
    }

    for rel in parent.owning() {
        if !present.insert(rel.target_type) {
            continue;
        }
        let Role::Owning {
            column,
            referenced_column,
        } = &rel.role
        else {
            continue;
        };
        let child = rel.target_meta()?;
        let join = format!(
            "LEFT JOIN {} ON {}.{} = {}.{}",
            child.qualified_table(),
            child.table_name(),
            referenced_column,
            parent.table_name(),
            column
        );
        node.children.push(joined(child, rel.field, JoinSide::Owning, join));
    }

    for child in &mut node.children {
        expand(child, present)?;
    }

    if node.meta.columns.is_empty() {
        return Err(Error::InvalidStatement(format!(
            "{} maps no columns to select",
            node.meta.type_name
        )));
    }
    Ok(())
}

fn joined(meta: Arc<EntityMeta>, via: &'static str, side: JoinSide, join: String) -> PlanNode {
    PlanNode {
        meta,
        via: Some(via),
        side: Some(side),
        join: Some(join),
        children: Vec::new(),
    }
}
