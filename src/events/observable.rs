//! Observable index attributes.

/// Transition of an observed index. `previous` is `None` the first time a
/// value is observed.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub current: i64,
    pub previous: Option<i64>,
}

/// Last observed value of an index attribute.
///
/// `refresh` reports a [`Change`] only when the value differs from the one
/// observed before; `sync` and `get_silently` never do.
#[derive(Debug, Default)]
pub struct Observable {
    value: Option<i64>,
}

impl Observable {
    pub fn new() -> Self {
        Observable::default()
    }

    /// Return the last observed value without recording anything.
    ///
    pub fn get_silently(&self) -> Option<i64> {
        self.value
    }

    pub fn refresh(&mut self, value: i64) -> Option<Change> {
        if self.value == Some(value) {
            return None;
        }
        let previous = self.value.replace(value);
        Some(Change {
            current: value,
            previous,
        })
    }

    /// Record `value` as observed without reporting a change.
    ///
    pub fn sync(&mut self, value: i64) {
        self.value = Some(value);
    }
}
