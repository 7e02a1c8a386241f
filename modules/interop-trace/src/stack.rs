use crate::span_id::SpanId;

/// Stack of causal scopes. Each layer holds the span ids that spans created
/// inside the scope are implicitly caused by.
#[derive(Debug, Clone, Default)]
pub struct CausalityStack {
    layers: Vec<Vec<SpanId>>,
}

impl CausalityStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_layer(&mut self, initial: impl IntoIterator<Item = SpanId>) {
        self.layers.push(initial.into_iter().collect());
    }

    /// Append to the top layer. Returns `false` when no layer exists.
    pub fn add_to_top(&mut self, id: SpanId) -> bool {
        match self.layers.last_mut() {
            Some(layer) => {
                layer.push(id);
                true
            }
            None => false,
        }
    }

    /// Remove the top layer, returning its ids in insertion order.
    /// Empty when there is no layer.
    pub fn pop_layer(&mut self) -> Vec<SpanId> {
        self.layers.pop().unwrap_or_default()
    }

    pub fn has_layer(&self) -> bool {
        !self.layers.is_empty()
    }

    pub fn top_layer(&self) -> &[SpanId] {
        self.layers.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Drop every layer above `depth`.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.layers.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u8) -> Vec<SpanId> {
        (1..=n).map(|i| SpanId::from_bytes([i; 16])).collect()
    }

    #[test]
    fn layers_are_lifo() {
        let all = ids(3);
        let mut stack = CausalityStack::new();
        stack.push_layer([all[0]]);
        stack.push_layer([all[1]]);
        stack.add_to_top(all[2]);

        assert_eq!(stack.pop_layer(), vec![all[1], all[2]]);
        assert!(stack.has_layer());
        assert_eq!(stack.pop_layer(), vec![all[0]]);
        assert!(!stack.has_layer());
    }

    #[test]
    fn add_without_layer_is_rejected() {
        let mut stack = CausalityStack::new();
        assert!(!stack.add_to_top(SpanId::generate()));
        assert!(!stack.has_layer());
    }

    #[test]
    fn pop_on_empty_stack_yields_nothing() {
        let mut stack = CausalityStack::new();
        assert!(stack.pop_layer().is_empty());
        assert!(stack.top_layer().is_empty());
    }

    #[test]
    fn empty_layer_still_counts_as_layer() {
        let mut stack = CausalityStack::new();
        stack.push_layer([]);
        assert!(stack.has_layer());
        assert!(stack.top_layer().is_empty());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn top_layer_reads_without_removing() {
        let all = ids(2);
        let mut stack = CausalityStack::new();
        stack.push_layer(all.clone());
        assert_eq!(stack.top_layer(), all.as_slice());
        assert_eq!(stack.depth(), 1);
    }
}
