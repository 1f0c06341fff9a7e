//! Fixed-capacity, insertion-ordered window of posts with FIFO eviction.
//!
//! The window never deduplicates: callers check [`BoundedHistory::contains`]
//! before pushing.

use super::Post;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedHistory {
    capacity: usize,
    posts: VecDeque<Post>,
}

impl BoundedHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            posts: VecDeque::new(),
        }
    }

    /// Rebuilds a history from persisted content, oldest first.
    ///
    /// Returns the offending length when `posts` does not fit in `capacity`.
    pub fn from_parts(capacity: usize, posts: Vec<Post>) -> Result<Self, usize> {
        if posts.len() > capacity {
            return Err(posts.len());
        }
        Ok(Self {
            capacity,
            posts: posts.into(),
        })
    }

    /// Appends `post`, evicting and returning the oldest post when the window
    /// is already full. With a capacity of zero the pushed post itself is
    /// returned.
    pub fn push(&mut self, post: Post) -> Option<Post> {
        if self.capacity == 0 {
            return Some(post);
        }
        let evicted = if self.posts.len() >= self.capacity {
            self.posts.pop_front()
        } else {
            None
        };
        self.posts.push_back(post);
        evicted
    }

    pub fn contains(&self, id: &str) -> bool {
        self.posts.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, Post> {
        self.posts.iter()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, evicting the oldest posts that no longer fit.
    /// Evicted posts are returned oldest first.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<Post> {
        self.capacity = capacity;
        let overflow = self.posts.len().saturating_sub(capacity);
        self.posts.drain(..overflow).collect()
    }

    pub fn to_vec(&self) -> Vec<Post> {
        self.posts.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a BoundedHistory {
    type Item = &'a Post;
    type IntoIter = std::collections::vec_deque::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            username: format!("user_{id}"),
            full_name: format!("User {id}"),
            caption: String::new(),
            image_url: format!("https://cdn.example/{id}.jpg"),
            taken_at: 0,
        }
    }

    fn ids(history: &BoundedHistory) -> Vec<&str> {
        history.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_push_below_capacity_does_not_evict() {
        let mut history = BoundedHistory::new(2);
        assert_eq!(history.push(post("A")), None);
        assert_eq!(history.push(post("B")), None);
        assert_eq!(ids(&history), vec!["A", "B"]);
    }

    #[test]
    fn test_push_at_capacity_evicts_oldest() {
        let mut history = BoundedHistory::new(2);
        history.push(post("A"));
        history.push(post("B"));

        let evicted = history.push(post("C"));
        assert_eq!(evicted.map(|p| p.id), Some("A".to_string()));
        assert_eq!(ids(&history), vec!["B", "C"]);
        assert!(!history.contains("A"));
        assert!(history.contains("B"));
        assert!(history.contains("C"));
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        for capacity in 0..6 {
            let mut history = BoundedHistory::new(capacity);
            let mut evictions = 0;
            for i in 0..20 {
                if history.push(post(&i.to_string())).is_some() {
                    evictions += 1;
                }
                assert!(history.len() <= capacity);
            }
            assert_eq!(history.len() + evictions, 20);
        }
    }

    #[test]
    fn test_eviction_order_is_fifo() {
        let mut history = BoundedHistory::new(3);
        let evicted: Vec<String> = (0..7)
            .filter_map(|i| history.push(post(&i.to_string())))
            .map(|p| p.id)
            .collect();
        assert_eq!(evicted, vec!["0", "1", "2", "3"]);
        assert_eq!(ids(&history), vec!["4", "5", "6"]);
    }

    #[test]
    fn test_zero_capacity_evicts_immediately() {
        let mut history = BoundedHistory::new(0);
        let evicted = history.push(post("A"));
        assert_eq!(evicted.map(|p| p.id), Some("A".to_string()));
        assert!(history.is_empty());
        assert!(!history.contains("A"));
    }

    #[test]
    fn test_duplicates_are_not_rejected() {
        let mut history = BoundedHistory::new(3);
        history.push(post("A"));
        history.push(post("A"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_get_by_id() {
        let mut history = BoundedHistory::new(2);
        history.push(post("A"));
        assert_eq!(history.get("A").map(|p| p.username.as_str()), Some("user_A"));
        assert!(history.get("B").is_none());
    }

    #[test]
    fn test_set_capacity_shrinks_from_the_front() {
        let mut history = BoundedHistory::new(4);
        for id in ["A", "B", "C", "D"] {
            history.push(post(id));
        }
        let evicted: Vec<String> = history.set_capacity(2).into_iter().map(|p| p.id).collect();
        assert_eq!(evicted, vec!["A", "B"]);
        assert_eq!(ids(&history), vec!["C", "D"]);
        assert_eq!(history.capacity(), 2);

        assert!(history.set_capacity(5).is_empty());
        assert_eq!(history.push(post("E")), None);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut history = BoundedHistory::new(usize::MAX);
        assert_eq!(history.push(post("A")), None);
        assert_eq!(history.capacity(), usize::MAX);
        assert_eq!(ids(&history), vec!["A"]);
    }

    #[test]
    fn test_from_parts_rejects_overflow() {
        let posts = vec![post("A"), post("B"), post("C")];
        assert_eq!(BoundedHistory::from_parts(2, posts.clone()), Err(3));

        let history = BoundedHistory::from_parts(3, posts).unwrap();
        assert_eq!(ids(&history), vec!["A", "B", "C"]);
    }
}
