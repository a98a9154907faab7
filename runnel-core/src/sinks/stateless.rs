use std::marker::PhantomData;

use crate::{
    channels::operator_io::{Input, Output},
    operators::StreamSink,
    stream::{OperatorBuilder, StreamBuilder},
    types::{Data, DataMessage, MaybeKey, Message, NoData, NoKey, NoTime, Timestamp},
};

/// A sink which writes every record it receives and holds no state
/// (or only ephemeral state)
pub struct StatelessSink<K, V, T, S: StatelessSinkImpl<K, V, T>>(S, PhantomData<(K, V, T)>);
impl<K, V, T, S> StatelessSink<K, V, T, S>
where
    S: StatelessSinkImpl<K, V, T>,
{
    /// Create a new stateless sink from the given sink implementation.
    pub fn new(sink: S) -> Self {
        Self(sink, PhantomData)
    }
}

/// Implementation of a stateless stream sink
pub trait StatelessSinkImpl<K, V, T>: 'static {
    /// Write a single record
    fn sink(&mut self, msg: DataMessage<K, V, T>);

    /// Suspend this sink.
    /// Suspend means the execution will be halted, but could continue later.
    /// Use this method to flush buffered records or to clean up any resources like external
    /// connections or file handles
    fn suspend(&mut self) {}
}

impl<K, V, T, S> StreamSink<K, V, T> for StatelessSink<K, V, T, S>
where
    K: MaybeKey,
    V: Data,
    T: Timestamp,
    S: StatelessSinkImpl<K, V, T>,
{
    fn consume_stream(mut self, name: &str, builder: StreamBuilder<K, V, T>) {
        builder.then(OperatorBuilder::direct(
            name,
            move |input: &mut Input<K, V, T>, _output: &mut Output<NoKey, NoData, NoTime>, _ctx| {
                if let Some(msg) = input.recv() {
                    match msg {
                        Message::Data(d) => self.0.sink(d),
                        Message::SuspendMarker(_s) => self.0.suspend(),
                        Message::Epoch(_) => (),
                    }
                }
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        operators::{Sink, Source},
        sources::{SingleIteratorSource, StatelessSource},
        worker::{ControlSignal, StreamProvider, WorkerBuilder},
    };

    struct Recorder {
        records: Rc<RefCell<Vec<i32>>>,
        suspended: Rc<RefCell<bool>>,
    }

    impl StatelessSinkImpl<NoKey, i32, usize> for Recorder {
        fn sink(&mut self, msg: DataMessage<NoKey, i32, usize>) {
            self.records.borrow_mut().push(msg.value);
        }

        fn suspend(&mut self) {
            *self.suspended.borrow_mut() = true;
        }
    }

    /// records sent before the suspend marker must reach the sink before it is suspended
    #[test]
    fn sinks_records_before_suspending() {
        let records = Rc::new(RefCell::new(Vec::new()));
        let suspended = Rc::new(RefCell::new(false));
        let mut builder = WorkerBuilder::new();
        builder
            .new_stream()
            .source(
                "numbers",
                StatelessSource::new(SingleIteratorSource::new(0..)),
            )
            .sink(
                "recorder",
                StatelessSink::new(Recorder {
                    records: Rc::clone(&records),
                    suspended: Rc::clone(&suspended),
                }),
            );
        let mut worker = builder.build(0, std::time::Duration::ZERO).unwrap();
        let (tx, rx) = flume::unbounded();
        tx.send(ControlSignal::Suspend).unwrap();
        worker.execute(&rx, || ());

        assert!(*suspended.borrow());
        assert_eq!(*records.borrow(), vec![0, 1]);
    }
}
