/// Holds at most one value. Every write replaces the previous one.
#[derive(Debug)]
pub struct Slot<T> {
    value: Option<T>,
}

impl<T> Slot<T> {
    /// Replaces the current value, returning the previous one
    pub fn set(&mut self, value: T) -> Option<T> {
        self.value.replace(value)
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Empties the slot, returning the value it held
    pub fn clear(&mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut slot = Slot::default();

        assert_eq!(slot.set("first"), None);
        assert_eq!(slot.set("second"), Some("first"));
        assert_eq!(slot.get(), Some(&"second"));

        assert_eq!(slot.clear(), Some("second"));
        assert_eq!(slot.get(), None);
        assert_eq!(slot.clear(), None);
    }
}
