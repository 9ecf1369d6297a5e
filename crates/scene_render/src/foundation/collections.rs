//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to a node stored in a [`SceneGraph`](crate::scene::SceneGraph)
    pub struct NodeId;
}

/// Handle-based map using slot map for stable references
pub type HandleMap<K, T> = SlotMap<K, T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut map: HandleMap<NodeId, u32> = HandleMap::with_key();
        let a = map.insert(1);
        map.remove(a);
        let b = map.insert(2);

        assert!(map.get(a).is_none());
        assert_eq!(map.get(b), Some(&2));
    }
}
