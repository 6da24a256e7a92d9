use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::detection::domain::expression_ranker::RankedExpressionList;

pub type FaceDetectedFn = Box<dyn Fn(bool) + Send>;
pub type ExpressionsDetectedFn = Box<dyn Fn(&RankedExpressionList) + Send>;

/// Outcome of one completed detection cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionCycleResult {
    pub face_detected: bool,
    /// Always empty when `face_detected` is false.
    pub expressions: RankedExpressionList,
}

impl DetectionCycleResult {
    pub fn no_face() -> Self {
        Self::default()
    }

    pub fn face(expressions: RankedExpressionList) -> Self {
        Self {
            face_detected: true,
            expressions,
        }
    }
}

/// Read side of the most recently published result, for consumers that poll
/// instead of subscribing.
#[derive(Clone, Debug, Default)]
pub struct PublishedState {
    latest: Arc<Mutex<DetectionCycleResult>>,
}

impl PublishedState {
    pub fn get(&self) -> DetectionCycleResult {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn face_detected(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .face_detected
    }

    fn replace(&self, result: DetectionCycleResult) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }
}

/// Shared on/off switch of a [`ResultPublisher`].
///
/// A publish holds the lock across its liveness check and both callbacks, so
/// [`Liveness::retire`] returns only after any in-progress publish finished.
/// A callback must not retire its own publisher.
#[derive(Clone, Debug)]
pub struct Liveness {
    live: Arc<Mutex<bool>>,
}

impl Liveness {
    fn new() -> Self {
        Self {
            live: Arc::new(Mutex::new(true)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_live(&self) -> bool {
        *self.lock()
    }

    /// Retires the publisher, waiting for a publish already in progress.
    pub fn retire(&self) {
        *self.lock() = false;
    }
}

/// Delivers each cycle's result to the two consumer callbacks.
///
/// Every publish overwrites the previous state; there is no hysteresis and
/// nothing is buffered between cycles. Once the publisher is retired (the
/// owning loop was torn down) results are discarded without touching the
/// consumer.
pub struct ResultPublisher {
    on_face_detected: Option<FaceDetectedFn>,
    on_expressions_detected: Option<ExpressionsDetectedFn>,
    state: PublishedState,
    live: Liveness,
}

impl ResultPublisher {
    pub fn new() -> Self {
        Self {
            on_face_detected: None,
            on_expressions_detected: None,
            state: PublishedState::default(),
            live: Liveness::new(),
        }
    }

    pub fn on_face_detected(mut self, callback: impl Fn(bool) + Send + 'static) -> Self {
        self.on_face_detected = Some(Box::new(callback));
        self
    }

    pub fn on_expressions_detected(
        mut self,
        callback: impl Fn(&RankedExpressionList) + Send + 'static,
    ) -> Self {
        self.on_expressions_detected = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> PublishedState {
        self.state.clone()
    }

    pub fn liveness(&self) -> Liveness {
        self.live.clone()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_live()
    }

    /// Publishes `result` to both callbacks. Returns false if the publisher
    /// has been retired and the result was dropped.
    pub fn publish(&self, result: DetectionCycleResult) -> bool {
        let live = self.live.lock();
        if !*live {
            return false;
        }
        debug_assert!(result.face_detected || result.expressions.is_empty());

        self.state.replace(result.clone());
        if let Some(ref callback) = self.on_face_detected {
            callback(result.face_detected);
        }
        if let Some(ref callback) = self.on_expressions_detected {
            callback(&result.expressions);
        }
        drop(live);
        true
    }
}

impl Default for ResultPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::confidence_map::ConfidenceMap;
    use crate::detection::domain::expression_ranker::ExpressionRanker;

    #[derive(Debug, PartialEq)]
    enum Event {
        Face(bool),
        Expressions(Vec<String>),
    }

    fn recording_publisher() -> (ResultPublisher, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let face_events = events.clone();
        let expr_events = events.clone();
        let publisher = ResultPublisher::new()
            .on_face_detected(move |detected| face_events.lock().unwrap().push(Event::Face(detected)))
            .on_expressions_detected(move |list| {
                let labels = list.iter().map(|s| s.label.clone()).collect();
                expr_events.lock().unwrap().push(Event::Expressions(labels));
            });
        (publisher, events)
    }

    fn happy_list() -> RankedExpressionList {
        let scores: ConfidenceMap = [("happy", 0.8), ("neutral", 0.1)].into_iter().collect();
        ExpressionRanker::default().rank(&scores)
    }

    #[test]
    fn test_publish_calls_both_callbacks_once() {
        let (publisher, events) = recording_publisher();
        assert!(publisher.publish(DetectionCycleResult::face(happy_list())));

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                Event::Face(true),
                Event::Expressions(vec!["happy".into(), "neutral".into()])
            ]
        );
    }

    #[test]
    fn test_no_face_overwrites_previous_face() {
        let (publisher, events) = recording_publisher();
        let state = publisher.state();
        publisher.publish(DetectionCycleResult::face(happy_list()));
        assert!(state.face_detected());

        publisher.publish(DetectionCycleResult::no_face());

        assert!(!state.face_detected());
        assert!(state.get().expressions.is_empty());
        let events = events.lock().unwrap();
        assert_eq!(events[2], Event::Face(false));
        assert_eq!(events[3], Event::Expressions(vec![]));
    }

    #[test]
    fn test_retired_publisher_discards_results() {
        let (publisher, events) = recording_publisher();
        publisher.liveness().retire();

        assert!(!publisher.publish(DetectionCycleResult::face(happy_list())));
        assert!(events.lock().unwrap().is_empty());
        assert!(!publisher.state().face_detected());
    }

    #[test]
    fn test_publish_without_callbacks_updates_state() {
        let publisher = ResultPublisher::new();
        publisher.publish(DetectionCycleResult::face(happy_list()));
        assert_eq!(publisher.state().get().expressions.len(), 2);
    }

    #[test]
    fn test_retire_waits_for_publish_in_progress() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let expressions_seen = Arc::new(Mutex::new(0usize));
        let seen = expressions_seen.clone();
        let publisher = ResultPublisher::new()
            .on_face_detected(move |_| {
                let _ = entered_tx.send(());
                let _ = release_rx.recv();
            })
            .on_expressions_detected(move |_| *seen.lock().unwrap() += 1);
        let liveness = publisher.liveness();

        let publishing =
            std::thread::spawn(move || publisher.publish(DetectionCycleResult::face(happy_list())));
        entered_rx.recv().unwrap();

        let retiring = std::thread::spawn(move || liveness.retire());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!retiring.is_finished());
        assert_eq!(*expressions_seen.lock().unwrap(), 0);

        release_tx.send(()).unwrap();
        retiring.join().unwrap();
        // Both callbacks of the admitted publish ran before retire returned.
        assert_eq!(*expressions_seen.lock().unwrap(), 1);
        assert!(publishing.join().unwrap());
    }
}
