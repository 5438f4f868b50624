use crate::field::Field;
use std::sync::Arc;

/// Immutable, persistent list of fields shared between derived contexts.
///
/// Every [`FieldChain::push`] adds a new segment that points at the previous
/// one, so a child context never copies or mutates what its parent holds.
/// Iteration yields fields in the order they were attached, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FieldChain {
    head: Option<Arc<Segment>>,
    len: usize,
}

#[derive(Debug)]
struct Segment {
    parent: Option<Arc<Segment>>,
    fields: Box<[Field]>,
}

impl FieldChain {
    pub fn new() -> Self {
        FieldChain::default()
    }

    /// Return a new chain with `fields` appended. `self` is left untouched.
    pub fn push(&self, fields: &[Field]) -> FieldChain {
        if fields.is_empty() {
            return self.clone();
        }
        FieldChain {
            head: Some(Arc::new(Segment {
                parent: self.head.clone(),
                fields: fields.to_vec().into_boxed_slice(),
            })),
            len: self.len + fields.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        let mut segments = Vec::new();
        let mut cursor = self.head.as_deref();
        while let Some(segment) = cursor {
            segments.push(segment);
            cursor = segment.parent.as_deref();
        }
        segments
            .into_iter()
            .rev()
            .flat_map(|segment| segment.fields.iter())
    }
}
