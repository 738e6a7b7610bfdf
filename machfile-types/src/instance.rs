use indexmap::IndexMap;

use crate::path::{NodePath, Segment};
use crate::value::Value;

/// Name of the implicit back-reference field every schema node carries.
pub const PARENT_FIELD: &str = "parent";

/// One node of an object graph: a concrete type tag plus its fields in schema order.
///
/// Instances are plain data; validation against the schema happens in the
/// registry (`instantiate`) and in the codec.
#[derive(Debug, Clone)]
pub struct Instance {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl Instance {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Sets a field, keeping its position when it already exists.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn object(&self, field: &str) -> Option<&Instance> {
        self.get(field).and_then(Value::as_object)
    }

    pub fn object_mut(&mut self, field: &str) -> Option<&mut Instance> {
        self.get_mut(field).and_then(Value::as_object_mut)
    }

    /// Items of a list field; empty when the field is absent or not a list.
    pub fn list(&self, field: &str) -> &[Instance] {
        self.get(field).and_then(Value::as_list).unwrap_or(&[])
    }

    /// Path of the owning node, once [`Instance::link_parents`] ran on the root.
    pub fn parent(&self) -> Option<&NodePath> {
        match self.get(PARENT_FIELD) {
            Some(Value::Ref(path)) => Some(path),
            _ => None,
        }
    }

    /// Points every owned child's `parent` field at its owner. Call on the root.
    pub fn link_parents(&mut self) {
        self.link_from(&NodePath::root());
    }

    fn link_from(&mut self, here: &NodePath) {
        for (name, value) in self.fields.iter_mut() {
            match value {
                Value::Object(child) => {
                    child.set(PARENT_FIELD, Value::Ref(here.clone()));
                    child.link_from(&here.field(name));
                }
                Value::List(items) => {
                    let list_path = here.field(name);
                    for (i, child) in items.iter_mut().enumerate() {
                        child.set(PARENT_FIELD, Value::Ref(here.clone()));
                        child.link_from(&list_path.index(i));
                    }
                }
                _ => {}
            }
        }
    }

    /// Node at `path` (`""` is `self`).
    pub fn find_node(&self, path: &str) -> Option<&Instance> {
        let path = NodePath::new(path);
        let segments = path.segments()?;
        descend(self, &segments)
    }

    pub fn find_node_mut(&mut self, path: &str) -> Option<&mut Instance> {
        let path = NodePath::new(path);
        let segments = path.segments()?;
        descend_mut(self, &segments)
    }

    /// Field value at `path`, e.g. `rotor.hole[0].magnet_0.Lmag`.
    pub fn find(&self, path: &str) -> Option<&Value> {
        let path = NodePath::new(path);
        let segments = path.segments()?;
        let (last, parents) = segments.split_last()?;
        let Segment::Field(name) = last else {
            return None;
        };
        descend(self, parents)?.get(name)
    }

    /// Pre-order walk over every node with its path.
    pub fn visit(&self, f: &mut dyn FnMut(&NodePath, &Instance)) {
        self.visit_from(&NodePath::root(), f);
    }

    fn visit_from(&self, here: &NodePath, f: &mut dyn FnMut(&NodePath, &Instance)) {
        f(here, self);
        for (name, value) in &self.fields {
            match value {
                Value::Object(child) => child.visit_from(&here.field(name), f),
                Value::List(items) => {
                    let list_path = here.field(name);
                    for (i, child) in items.iter().enumerate() {
                        child.visit_from(&list_path.index(i), f);
                    }
                }
                _ => {}
            }
        }
    }

    /// Mutable pre-order walk; children are visited after `f` ran on their owner.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&NodePath, &mut Instance)) {
        self.visit_mut_from(&NodePath::root(), f);
    }

    fn visit_mut_from(&mut self, here: &NodePath, f: &mut dyn FnMut(&NodePath, &mut Instance)) {
        f(here, self);
        for (name, value) in self.fields.iter_mut() {
            match value {
                Value::Object(child) => child.visit_mut_from(&here.field(name), f),
                Value::List(items) => {
                    let list_path = here.field(name);
                    for (i, child) in items.iter_mut().enumerate() {
                        child.visit_mut_from(&list_path.index(i), f);
                    }
                }
                _ => {}
            }
        }
    }
}

fn descend<'a>(mut node: &'a Instance, segments: &[Segment<'_>]) -> Option<&'a Instance> {
    let mut iter = segments.iter().peekable();
    while let Some(segment) = iter.next() {
        let Segment::Field(name) = segment else {
            return None;
        };
        node = match iter.peek() {
            Some(Segment::Index(i)) => {
                let i = *i;
                iter.next();
                node.list(name).get(i)?
            }
            _ => node.object(name)?,
        };
    }
    Some(node)
}

fn descend_mut<'a>(mut node: &'a mut Instance, segments: &[Segment<'_>]) -> Option<&'a mut Instance> {
    let mut iter = segments.iter().peekable();
    while let Some(segment) = iter.next() {
        let Segment::Field(name) = segment else {
            return None;
        };
        node = match iter.peek() {
            Some(Segment::Index(i)) => {
                let i = *i;
                iter.next();
                node.get_mut(name)?.as_list_mut()?.get_mut(i)?
            }
            _ => node.object_mut(name)?,
        };
    }
    Some(node)
}
