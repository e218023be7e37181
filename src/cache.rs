//! Broadcast registry that keeps every handle for one `(root, path)` pointing at the same node.
//!
//! Every successful resolution or creation is published here. Subscribers are held weakly, so a
//! dropped handle unsubscribes itself. Fan-out pushes every entry to every live subscriber and
//! each subscriber compares the key with its own current `(root, path)`.
//!
//! Delivery happens on the cache's home thread. A publish from the home thread fans out before
//! returning; a publish from any other thread is queued and delivered by the next
//! [`ResolutionCache::dispatch_pending`] on the home thread.

use std::collections::VecDeque;
use std::sync::{Mutex, Weak};
use std::thread::{self, ThreadId};

use log::{debug, trace, warn};

use crate::codec::{NodeHandle, TreeRoot};
use crate::lock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub root: TreeRoot,
    pub path: String,
    pub node: NodeHandle,
    /// Set by renames and moves: matching subscribers also take this as their new path.
    pub renamed_path: Option<String>,
}

impl CacheEntry {
    pub fn matches(&self, root: &TreeRoot, path: &str) -> bool {
        &self.root == root && self.path == path
    }
}

pub trait Subscriber: Send + Sync {
    fn on_publish(&self, entry: &CacheEntry);
}

pub struct ResolutionCache {
    home: ThreadId,
    subscribers: Mutex<Vec<Weak<dyn Subscriber>>>,
    pending: Mutex<VecDeque<CacheEntry>>,
    latest: Mutex<Option<CacheEntry>>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionCache {
    /// Creates a cache whose home thread is the calling thread.
    pub fn new() -> Self {
        Self::with_home(thread::current().id())
    }

    pub fn with_home(home: ThreadId) -> Self {
        Self {
            home,
            subscribers: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            latest: Mutex::new(None),
        }
    }

    pub fn is_home_thread(&self) -> bool {
        thread::current().id() == self.home
    }

    pub fn subscribe(&self, subscriber: Weak<dyn Subscriber>) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| s.strong_count() > 0);
        subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| s.strong_count() > 0);
        subscribers.len()
    }

    pub fn publish(&self, entry: CacheEntry) {
        if self.is_home_thread() {
            self.deliver(&entry);
        } else {
            debug!("queueing off-thread publish for {}", entry.path);
            lock(&self.pending).push_back(entry);
        }
    }

    /// Delivers queued off-thread publishes. Only effective on the home thread; returns the
    /// number of entries delivered.
    pub fn dispatch_pending(&self) -> usize {
        if !self.is_home_thread() {
            warn!("dispatch_pending called off the home thread, ignoring");
            return 0;
        }

        let drained: Vec<CacheEntry> = lock(&self.pending).drain(..).collect();
        for entry in &drained {
            self.deliver(entry);
        }
        drained.len()
    }

    pub fn pending(&self) -> usize {
        lock(&self.pending).len()
    }

    /// The most recently delivered entry.
    pub fn latest(&self) -> Option<CacheEntry> {
        lock(&self.latest).clone()
    }

    fn deliver(&self, entry: &CacheEntry) {
        // Subscribers run without the list locked so they may publish or subscribe themselves.
        let live: Vec<_> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|s| s.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };

        trace!("publish {} -> {} to {} subscribers", entry.path, entry.node, live.len());
        *lock(&self.latest) = Some(entry.clone());

        for subscriber in live {
            subscriber.on_publish(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, RwLock};

    use crate::codec::DocumentId;
    use crate::{read_lock, write_lock};

    struct Watcher {
        root: TreeRoot,
        path: RwLock<String>,
        node: RwLock<Option<NodeHandle>>,
    }

    impl Watcher {
        fn new(root: &TreeRoot, path: &str) -> Arc<Self> {
            Arc::new(Self { root: root.clone(), path: RwLock::new(path.into()), node: RwLock::new(None) })
        }
    }

    impl Subscriber for Watcher {
        fn on_publish(&self, entry: &CacheEntry) {
            let path = read_lock(&self.path).clone();
            if entry.matches(&self.root, &path) {
                *write_lock(&self.node) = Some(entry.node.clone());
                if let Some(renamed) = &entry.renamed_path {
                    *write_lock(&self.path) = renamed.clone();
                }
            }
        }
    }

    fn root() -> TreeRoot {
        TreeRoot::new("test", "primary:")
    }

    fn entry(path: &str, id: &str, renamed: Option<&str>) -> CacheEntry {
        CacheEntry {
            root: root(),
            path: path.into(),
            node: root().node_handle(DocumentId::new(id)),
            renamed_path: renamed.map(str::to_string),
        }
    }

    #[test]
    fn only_matching_subscribers_update() {
        let cache = ResolutionCache::new();
        let xy = Watcher::new(&root(), "/x/y");
        let other = Watcher::new(&root(), "/x/z");
        let xy_weak = Arc::downgrade(&xy);
        let xy_weak: Weak<dyn Subscriber> = xy_weak;
        let other_weak = Arc::downgrade(&other);
        let other_weak: Weak<dyn Subscriber> = other_weak;
        cache.subscribe(xy_weak);
        cache.subscribe(other_weak);

        cache.publish(entry("/x/y", "primary:7", None));

        assert_eq!(read_lock(&xy.node).as_ref().map(|n| n.document_id().as_str()), Some("primary:7"));
        assert!(read_lock(&other.node).is_none());
    }

    #[test]
    fn renamed_subscriber_stops_matching_old_key() {
        let cache = ResolutionCache::new();
        let watcher = Watcher::new(&root(), "/a/old.txt");
        let weak = Arc::downgrade(&watcher);
        let weak: Weak<dyn Subscriber> = weak;
        cache.subscribe(weak);

        cache.publish(entry("/a/old.txt", "primary:1", Some("/a/new.txt")));
        assert_eq!(*read_lock(&watcher.path), "/a/new.txt");

        cache.publish(entry("/a/old.txt", "primary:2", None));
        assert_eq!(read_lock(&watcher.node).as_ref().map(|n| n.document_id().as_str()), Some("primary:1"));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let cache = ResolutionCache::new();
        let watcher = Watcher::new(&root(), "/p");
        let weak = Arc::downgrade(&watcher);
        let weak: Weak<dyn Subscriber> = weak;
        cache.subscribe(weak);
        assert_eq!(cache.subscriber_count(), 1);

        drop(watcher);
        cache.publish(entry("/p", "primary:1", None));
        assert_eq!(cache.subscriber_count(), 0);
    }

    #[test]
    fn off_thread_publish_waits_for_dispatch() {
        let cache = Arc::new(ResolutionCache::new());
        let watcher = Watcher::new(&root(), "/late");
        let weak = Arc::downgrade(&watcher);
        let weak: Weak<dyn Subscriber> = weak;
        cache.subscribe(weak);

        let remote = Arc::clone(&cache);
        thread::spawn(move || remote.publish(entry("/late", "primary:9", None)))
            .join()
            .unwrap();

        assert!(read_lock(&watcher.node).is_none());
        assert_eq!(cache.pending(), 1);

        assert_eq!(cache.dispatch_pending(), 1);
        assert!(read_lock(&watcher.node).is_some());
        assert_eq!(cache.latest().map(|e| e.path), Some("/late".to_string()));
    }
}
