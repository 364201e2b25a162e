use super::EngineSignal;

/// Receives signals produced by a session.
///
/// Implemented by the rendering bridge (asset changes) and by anything else
/// that wants to observe the engine without owning it.
pub trait SignalHandler {
    fn handle_signal(&mut self, signal: &EngineSignal);

    fn handle_signals(&mut self, signals: &[EngineSignal]) {
        for signal in signals {
            self.handle_signal(signal);
        }
    }
}
