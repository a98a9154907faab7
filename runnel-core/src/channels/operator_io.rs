//! Local IO channels for stream operators. These input and output types are how operators
//! **on the same worker** communicate with each other.
//! Essentially these are the edges in the stream graph.
use super::spsc;
use crate::types::{MaybeTime, Message};

/// Operator Output
pub struct Output<K, V, T> {
    // Each sender in this Vec is essentially one outgoing
    // edge from the operator
    senders: Vec<spsc::Sender<Message<K, V, T>>>,
    frontier: Option<T>,
    suspended: bool,
}

impl<K, V, T> Output<K, V, T>
where
    K: Clone,
    V: Clone,
    T: Clone + MaybeTime,
{
    /// Create a new Output with **no** associated Input
    /// Link an input with [link].
    pub(crate) fn new_unlinked() -> Self {
        Self {
            senders: Vec::new(),
            frontier: None,
            suspended: false,
        }
    }

    /// Send a message into this output.
    /// Every message is broadcast to all linked inputs.
    pub fn send(&mut self, msg: Message<K, V, T>) {
        debug_assert!(!self.suspended);
        match &msg {
            Message::Epoch(e) => {
                if self.frontier.as_ref().is_none_or(|x| e > x) {
                    self.frontier = Some(e.clone());
                }
            }
            Message::SuspendMarker(_) => self.suspended = true,
            Message::Data(_) => (),
        }
        // repeat_n will clone for every iteration except the last
        // this gives us a small optimization on the common "1 receiver" case :)
        let recipient_len = self.senders.len();
        let messages = self
            .senders
            .iter()
            .zip(itertools::repeat_n(msg, recipient_len));
        for (sender, elem) in messages {
            sender.send(elem);
        }
    }

    /// Get the frontier on this Output, i.e the timestamp of the largest
    /// Epoch sent with this output or `None` if no Epoch has been sent
    /// yet
    #[inline]
    pub fn get_frontier(&self) -> &Option<T> {
        &self.frontier
    }

    /// Check if a [Message::SuspendMarker] has been sent into this output
    #[inline]
    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended
    }
}

/// State of the upstream output providing us messages
struct UpstreamState<K, V, T> {
    /// Most recent epoch the upstream sent
    epoch: Option<T>,
    receiver: spsc::Receiver<Message<K, V, T>>,
}
impl<K, V, T> UpstreamState<K, V, T> {
    fn new(receiver: spsc::Receiver<Message<K, V, T>>) -> Self {
        Self {
            epoch: None,
            receiver,
        }
    }
}

/// Operator Input
pub struct Input<K, V, T> {
    /// Each receiver in this Vec is an inbound edge to the
    /// operator
    receivers: Vec<UpstreamState<K, V, T>>,
    // largest observed Epoch
    frontier: Option<T>,
}

impl<K, V, T> Input<K, V, T> {
    /// Create a new input which is not (yet) linked to any output
    pub(crate) fn new_unlinked() -> Self {
        Self {
            receivers: Vec::new(),
            frontier: None,
        }
    }

    /// Return true if this input has a message which can be received right away.
    /// Suspend markers only count once they are aligned, so they are not considered here.
    pub(crate) fn can_progress(&self) -> bool {
        self.receivers
            .iter()
            .any(|x| x.receiver.can_recv_unaligned())
    }

    /// Get the frontier of this Input, i.e. the largest Epoch it has seen so far
    #[inline]
    pub(crate) fn get_frontier(&self) -> &Option<T> {
        &self.frontier
    }
}

impl<K, V, T> Input<K, V, T>
where
    T: MaybeTime,
{
    /// Receive a message. None if there is no message to receive.
    ///
    /// Epochs are only emitted once every upstream reported one, the emitted epoch is the
    /// merge (minimum) of all upstream epochs.
    /// Suspend markers are aligned: a single marker is emitted once every upstream has one
    /// queued.
    pub fn recv(&mut self) -> Option<Message<K, V, T>> {
        // TODO: This is left biased
        let next = self
            .receivers
            .iter()
            .enumerate()
            .find_map(|(i, x)| x.receiver.recv_unaligned().map(|msg| (msg, i)));
        match next {
            Some((Message::Epoch(e), sender_idx)) => {
                if let Some(upstream) = self.receivers.get_mut(sender_idx) {
                    upstream.epoch = Some(e);
                }
                let merged = merge_timestamps(self.receivers.iter().map(|x| &x.epoch));
                if let Some(m) = merged.as_ref() {
                    if self.frontier.as_ref().is_none_or(|frontier| frontier < m) {
                        self.frontier = Some(m.clone());
                    }
                }
                merged.map(Message::Epoch)
            }
            Some((msg, _)) => Some(msg),
            None => {
                // either no upstream has anything for us, or some have a suspend marker
                // waiting for the others
                if self.receivers.is_empty() || self.receivers.iter().any(|x| x.receiver.is_empty())
                {
                    return None;
                }
                // every upstream has a suspend marker upcoming,
                // take .last() to clear the markers from all receivers
                self.receivers
                    .iter()
                    .flat_map(|x| x.receiver.recv())
                    .last()
            }
        }
    }
}

trait RecvUnaligned<K, V, T> {
    /// Check for messages which do not require alignment, i.e. everything but suspend markers
    fn can_recv_unaligned(&self) -> bool;
    /// Receive only those message types which do not require alignment
    fn recv_unaligned(&self) -> Option<Message<K, V, T>>;
}

impl<K, V, T> RecvUnaligned<K, V, T> for spsc::Receiver<Message<K, V, T>> {
    fn recv_unaligned(&self) -> Option<Message<K, V, T>> {
        self.can_recv_unaligned().then(|| self.recv()).flatten()
    }

    fn can_recv_unaligned(&self) -> bool {
        self.peek_apply(|next| !matches!(next, Message::SuspendMarker(_)))
            .unwrap_or(false)
    }
}

/// Link an output and input together
pub(crate) fn link<K, V, T>(sender: &mut Output<K, V, T>, receiver: &mut Input<K, V, T>) {
    let (tx, rx) = spsc::unbounded();
    sender.senders.push(tx);
    receiver.receivers.push(UpstreamState::new(rx));
}

/// Small reducer hack, as we can't use iter::reduce because of ownership
fn merge_timestamps<'a, T: MaybeTime>(
    mut timestamps: impl Iterator<Item = &'a Option<T>>,
) -> Option<T> {
    let mut merged = timestamps.next()?.clone();
    for x in timestamps {
        if let Some(y) = x {
            merged = merged.and_then(|a| a.try_merge(y));
        } else {
            return None;
        }
    }
    merged
}

/// Merge multiple inputs into a single input. The new Input will be linked to all the original
/// upstream Outputs.
pub(crate) fn merge_inputs<K, V, T: MaybeTime>(groups: Vec<Input<K, V, T>>) -> Input<K, V, T> {
    let frontier = merge_timestamps(groups.iter().map(|x| x.get_frontier()));
    let receivers: Vec<_> = groups.into_iter().flat_map(|x| x.receivers).collect();
    Input {
        receivers,
        frontier,
    }
}
