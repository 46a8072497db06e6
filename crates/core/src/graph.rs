//! The object graph handed to downstream serializers.
//!
//! The graph owns every record. Top-level records are kept in source order;
//! embedded records live in a separate arena and are named by the field that
//! holds them through their [`ObjectId`]. Both embedding and references are
//! plain identifiers, so no record contains another and nothing in the graph
//! is nested deeper than one record.

use crate::error::Diagnostic;
use std::collections::BTreeMap;
use std::fmt;
use time::PrimitiveDateTime;

/// Stable identifier of a record within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out record identifiers in creation order.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue numbering after the highest id already present in `graph`.
    pub fn after(graph: &ObjectGraph) -> Self {
        let max = graph
            .records
            .iter()
            .chain(&graph.embedded)
            .map(|r| r.id.0)
            .max();
        IdAllocator {
            next: max.map_or(0, |m| m + 1),
        }
    }

    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Str(String),
    Int(i64),
    DateTime(PrimitiveDateTime),
    List(Vec<Value>),
    /// A tag name awaiting reference resolution. None survive a successful
    /// conversion.
    TagRef(String),
    /// Non-owning reference to a tagged top-level record.
    ObjectRef(ObjectId),
    /// An embedded record, stored in the graph's arena. Only the field that
    /// consumed the block names it (clones of one block share the id).
    EmbeddedObject(ObjectId),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::TagRef(_) => "tag-ref",
            Value::ObjectRef(_) => "ref",
            Value::EmbeddedObject(_) => "object",
        }
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    /// The class group that declared this field.
    pub class: String,
    pub value: Value,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub id: ObjectId,
    /// Contributing classes, most general first, without duplicates.
    pub classes: Vec<String>,
    /// Fields in declaration order; names are unique.
    pub fields: Vec<Field>,
    pub tag: Option<String>,
    /// Zero-based index of the cluster this record came from.
    pub cluster: usize,
    pub line: u32,
}

impl ObjectRecord {
    pub fn new(id: ObjectId, cluster: usize, line: u32) -> Self {
        ObjectRecord {
            id,
            classes: Vec::new(),
            fields: Vec::new(),
            tag: None,
            cluster,
            line,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).map(|f| &f.value)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    /// Insert or overwrite a field. An overwritten field keeps its position.
    /// Returns the replaced field, if any.
    pub fn set_field(&mut self, field: Field) -> Option<Field> {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => Some(std::mem::replace(slot, field)),
            None => {
                self.fields.push(field);
                None
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tag table
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEntry {
    pub id: ObjectId,
    /// Line of the tag declaration.
    pub line: u32,
}

/// User tag name to record identifier. Created fresh for every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagTable {
    entries: BTreeMap<String, TagEntry>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`. Returns the earlier entry if the name is taken; the
    /// table is left unchanged in that case.
    pub fn declare(&mut self, name: &str, entry: TagEntry) -> Result<(), TagEntry> {
        if let Some(first) = self.entries.get(name) {
            return Err(*first);
        }
        self.entries.insert(name.to_owned(), entry);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<ObjectId> {
        self.entries.get(name).map(|e| e.id)
    }

    /// Reverse lookup, used by the emitter.
    pub fn name_of(&self, id: ObjectId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, e)| e.id == id)
            .map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ──────────────────────────────────────────────
// Graph
// ──────────────────────────────────────────────

/// Read-only traversal hooks for serializers.
///
/// Embedded records are entered with `depth + 1` right after the field that
/// holds them. References are reported through
/// [`GraphVisitor::visit_reference`] and never followed.
pub trait GraphVisitor {
    fn enter_record(&mut self, _record: &ObjectRecord, _depth: usize) {}
    fn visit_field(&mut self, _owner: &ObjectRecord, _field: &Field, _depth: usize) {}
    fn visit_reference(&mut self, _field: &Field, _target: Option<&ObjectRecord>, _depth: usize) {}
    fn leave_record(&mut self, _record: &ObjectRecord, _depth: usize) {}
}

/// The result of converting one document. Immutable once assembled, apart
/// from [`crate::assign::apply_assignments`].
///
/// Ids increase along both `records` and `embedded`, which is how they are
/// allocated; lookups rely on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGraph {
    pub(crate) records: Vec<ObjectRecord>,
    pub(crate) embedded: Vec<ObjectRecord>,
    pub(crate) tags: TagTable,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// Pending work of [`ObjectGraph::walk`].
enum Step<'g> {
    Enter(&'g ObjectRecord, usize),
    Field(&'g ObjectRecord, &'g Field, usize),
    Value(&'g Field, &'g Value, usize),
    Leave(&'g ObjectRecord, usize),
}

impl ObjectGraph {
    pub fn new(
        records: Vec<ObjectRecord>,
        mut embedded: Vec<ObjectRecord>,
        tags: TagTable,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        embedded.sort_by_key(|r| r.id);
        ObjectGraph {
            records,
            embedded,
            tags,
            diagnostics,
        }
    }

    /// Top-level records in source cluster order.
    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    /// Embedded records in id order.
    pub fn embedded(&self) -> &[ObjectRecord] {
        &self.embedded
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Find a record by id, top-level or embedded.
    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        lookup(&self.records, id).or_else(|| lookup(&self.embedded, id))
    }

    pub fn by_tag(&self, name: &str) -> Option<&ObjectRecord> {
        self.tags.lookup(name).and_then(|id| self.get(id))
    }

    /// Depth-first walk over the top-level records and everything they
    /// embed. Runs on an explicit stack, so embedding depth is not limited
    /// by the call stack.
    pub fn walk(&self, visitor: &mut impl GraphVisitor) {
        let mut stack: Vec<Step<'_>> = self
            .records
            .iter()
            .rev()
            .map(|r| Step::Enter(r, 0))
            .collect();

        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(record, depth) => {
                    visitor.enter_record(record, depth);
                    stack.push(Step::Leave(record, depth));
                    for field in record.fields.iter().rev() {
                        stack.push(Step::Field(record, field, depth));
                    }
                }
                Step::Field(owner, field, depth) => {
                    visitor.visit_field(owner, field, depth);
                    stack.push(Step::Value(field, &field.value, depth));
                }
                Step::Value(field, value, depth) => match value {
                    Value::EmbeddedObject(id) => {
                        if let Some(sub) = self.get(*id) {
                            stack.push(Step::Enter(sub, depth + 1));
                        }
                    }
                    Value::ObjectRef(id) => visitor.visit_reference(field, self.get(*id), depth),
                    Value::List(items) => {
                        for item in items.iter().rev() {
                            stack.push(Step::Value(field, item, depth));
                        }
                    }
                    _ => {}
                },
                Step::Leave(record, depth) => visitor.leave_record(record, depth),
            }
        }
    }

    /// Equality that ignores line provenance, cluster indices, diagnostics
    /// and field order.
    pub fn structurally_eq(&self, other: &ObjectGraph) -> bool {
        all_match(&self.records, &other.records)
            && all_match(&self.embedded, &other.embedded)
            && self.tags.len() == other.tags.len()
            && self
                .tags
                .iter()
                .all(|(name, e)| other.tags.lookup(name) == Some(e.id))
    }
}

fn lookup(records: &[ObjectRecord], id: ObjectId) -> Option<&ObjectRecord> {
    records
        .binary_search_by_key(&id, |r| r.id)
        .ok()
        .map(|i| &records[i])
}

fn all_match(a: &[ObjectRecord], b: &[ObjectRecord]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| records_match(x, y))
}

// Embedded values compare by id; the records behind them are compared
// through the arena.
fn records_match(a: &ObjectRecord, b: &ObjectRecord) -> bool {
    a.id == b.id
        && a.classes == b.classes
        && a.tag == b.tag
        && a.fields.len() == b.fields.len()
        && a.fields.iter().all(|fa| {
            b.field(&fa.name)
                .is_some_and(|fb| fa.class == fb.class && fa.value == fb.value)
        })
}
