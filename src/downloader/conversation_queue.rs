//! Batched conversation queries
//!
//! Reply threads are fetched with one search per batch of conversation ids:
//! `conversation_id:1 OR conversation_id:2 ... <postfix>`. The endpoint caps
//! query length, so ids are packed greedily up to `max_length`.

use std::collections::{HashSet, VecDeque};

const ID_PREFIX: &str = "conversation_id:";
const SEPARATOR: &str = " OR ";

/// FIFO of conversation ids waiting to be packed into queries
#[derive(Debug, Clone)]
pub struct ConversationBatchQueue {
    pending: VecDeque<String>,
    postfix: String,
    max_length: usize,
}

impl ConversationBatchQueue {
    /// Create an empty queue
    ///
    /// `postfix` is appended once to every emitted query. Lengths are
    /// measured in characters.
    pub fn new(postfix: impl Into<String>, max_length: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            postfix: postfix.into(),
            max_length,
        }
    }

    /// Append an id to the back of the queue
    pub fn push(&mut self, conversation_id: impl Into<String>) {
        self.pending.push_back(conversation_id.into());
    }

    /// Number of ids not yet packed into a query
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when no ids are waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pack ids from the front of the queue into one query
    ///
    /// Returns a query as soon as the next id would push it past
    /// `max_length`; the ids packed into it leave the queue. When every
    /// pending id fits, returns `None` unless `finalize` is set, in which
    /// case everything pending is emitted.
    ///
    /// An id too long to fit on its own blocks the queue in non-final mode
    /// and is emitted alone, over length, when `finalize` is set.
    pub fn get_query(&mut self, finalize: bool) -> Option<String> {
        let postfix_len = if self.postfix.is_empty() {
            0
        } else {
            self.postfix.chars().count() + 1
        };

        let mut body_len = 0;
        let mut consumed = 0;
        for id in &self.pending {
            let separator_len = if consumed == 0 { 0 } else { SEPARATOR.len() };
            let candidate = body_len + separator_len + ID_PREFIX.len() + id.chars().count();

            if candidate + postfix_len > self.max_length {
                if consumed == 0 {
                    if !finalize {
                        return None;
                    }
                    consumed = 1;
                }
                return Some(self.emit(consumed));
            }

            body_len = candidate;
            consumed += 1;
        }

        if finalize && consumed > 0 {
            Some(self.emit(consumed))
        } else {
            None
        }
    }

    /// Emit final queries until the queue is empty
    pub fn flush_all(&mut self) -> Vec<String> {
        let mut queries = Vec::new();
        while let Some(query) = self.get_query(true) {
            queries.push(query);
        }
        queries
    }

    fn emit(&mut self, count: usize) -> String {
        let body = self
            .pending
            .drain(..count)
            .map(|id| format!("{ID_PREFIX}{id}"))
            .collect::<Vec<_>>()
            .join(SEPARATOR);

        if self.postfix.is_empty() {
            body
        } else {
            format!("{body} {}", self.postfix)
        }
    }
}

/// Conversation ids already submitted plus the batch queue
///
/// Each id is offered to the queue at most once per session.
#[derive(Debug, Clone)]
pub struct ConversationBacklog {
    seen: HashSet<String>,
    queue: ConversationBatchQueue,
}

impl ConversationBacklog {
    /// Create an empty backlog
    pub fn new(postfix: impl Into<String>, max_length: usize) -> Self {
        Self {
            seen: HashSet::new(),
            queue: ConversationBatchQueue::new(postfix, max_length),
        }
    }

    /// Queue `conversation_id` unless it was seen before
    ///
    /// Returns true when the id was newly queued.
    pub fn offer(&mut self, conversation_id: &str) -> bool {
        if !self.seen.insert(conversation_id.to_string()) {
            return false;
        }
        self.queue.push(conversation_id);
        true
    }

    /// A full batch, if enough ids have accumulated
    pub fn ready_query(&mut self) -> Option<String> {
        self.queue.get_query(false)
    }

    /// Every remaining id, packed into as many queries as needed
    pub fn drain(&mut self) -> Vec<String> {
        self.queue.flush_all()
    }

    /// Ids queued but not yet packed
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Distinct ids offered so far
    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}
