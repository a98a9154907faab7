use super::stateless_op::StatelessOp;
use crate::channels::operator_io::Output;
use crate::stream::StreamBuilder;

use crate::types::{Data, DataMessage, KeyValue, MaybeKey, Message, Timestamp};

/// Apply a function to the value of every record in a stream of [KeyValue]s
pub trait MapValues<K, RK, V, T, VO>: super::sealed::Sealed {
    /// Transform the value of every record while keeping its record key.
    ///
    /// This is the operator of choice for streams read from topics, where the stream carries
    /// [KeyValue] records and only the value should change.
    ///
    /// # Example
    /// ```rust
    /// use runnel::operators::*;
    /// use runnel::runtime::SingleThreadRuntime;
    /// use runnel::sources::{SingleIteratorSource, StatelessSource};
    /// use runnel::worker::StreamProvider;
    /// use runnel::sinks::{VecSink, StatelessSink};
    /// use runnel::types::KeyValue;
    ///
    /// let sink = VecSink::new();
    /// let sink_clone = sink.clone();
    /// let records = vec![
    ///     KeyValue::new(Some(1), "hello".to_string()),
    ///     KeyValue::unkeyed("world".to_string()),
    /// ];
    ///
    /// SingleThreadRuntime::builder()
    ///     .build(move |provider: &mut dyn StreamProvider| {
    ///         provider.new_stream()
    ///         .source("records", StatelessSource::new(SingleIteratorSource::new(records.clone())))
    ///         .map_values("uppercase", |v: String| v.to_uppercase())
    ///         .sink("sink", StatelessSink::new(sink_clone.clone()));
    ///     })
    ///     .execute()
    ///     .unwrap();
    ///
    /// let out: Vec<KeyValue<i32, String>> = sink.into_iter().map(|x| x.value).collect();
    /// assert_eq!(out, vec![
    ///     KeyValue::new(Some(1), "HELLO".to_string()),
    ///     KeyValue::unkeyed("WORLD".to_string()),
    /// ]);
    /// ```
    fn map_values(
        self,
        name: &str,
        mapper: impl (FnMut(V) -> VO) + 'static,
    ) -> StreamBuilder<K, KeyValue<RK, VO>, T>;
}

impl<K, RK, V, T, VO> MapValues<K, RK, V, T, VO> for StreamBuilder<K, KeyValue<RK, V>, T>
where
    K: MaybeKey,
    RK: Data,
    V: Data,
    VO: Data,
    T: Timestamp,
{
    fn map_values(
        self,
        name: &str,
        mut mapper: impl (FnMut(V) -> VO) + 'static,
    ) -> StreamBuilder<K, KeyValue<RK, VO>, T> {
        self.stateless_op(
            name,
            move |item: DataMessage<K, KeyValue<RK, V>, T>,
                  out: &mut Output<K, KeyValue<RK, VO>, T>| {
                let record = item.value;
                out.send(Message::Data(DataMessage::new(
                    item.key,
                    KeyValue::new(record.key, mapper(record.value)),
                    item.timestamp,
                )));
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use proptest::prelude::*;

    use super::MapValues;
    use crate::{
        operators::{Sink, Source},
        sinks::{StatelessSink, VecSink},
        sources::{SingleIteratorSource, StatelessSource},
        testing::get_test_rt,
        types::KeyValue,
    };

    fn run_uppercase(records: Vec<KeyValue<String, String>>) -> Vec<KeyValue<String, String>> {
        let collector = VecSink::new();
        let rt = get_test_rt(|provider| {
            provider
                .new_stream()
                .source(
                    "source",
                    StatelessSource::new(SingleIteratorSource::new(records.clone())),
                )
                .map_values("uppercase", |v: String| v.to_uppercase())
                .sink("sink", StatelessSink::new(collector.clone()));
        });
        rt.execute().unwrap();
        collector.into_iter().map(|x| x.value).collect_vec()
    }

    #[test]
    fn uppercases_values() {
        let input = ["hello", "world"]
            .into_iter()
            .map(|x| KeyValue::unkeyed(x.to_string()))
            .collect_vec();
        let output = run_uppercase(input)
            .into_iter()
            .map(|x| x.value)
            .collect_vec();
        assert_eq!(output, vec!["HELLO".to_string(), "WORLD".to_string()]);
    }

    #[test]
    fn keeps_record_keys() {
        let input = vec![KeyValue::new(Some("k".to_string()), "v".to_string())];
        let output = run_uppercase(input);
        assert_eq!(
            output,
            vec![KeyValue::new(Some("k".to_string()), "V".to_string())]
        );
    }

    proptest! {
        /// order and count of records are preserved
        #[test]
        fn preserves_order_and_count(values in proptest::collection::vec("[a-z]{0,8}", 0..32)) {
            let input = values.iter().map(|x| KeyValue::unkeyed(x.clone())).collect_vec();
            let output = run_uppercase(input);
            let expected = values.iter().map(|x| x.to_uppercase()).collect_vec();
            prop_assert_eq!(output.into_iter().map(|x| x.value).collect_vec(), expected);
        }
    }
}
