//! Scripted processing engine for integration tests

use std::collections::HashMap;
use std::sync::{Mutex, mpsc};
use media_queue::{EngineFault, EngineOutput, EngineRequest, ProcessingEngine};

/// What the engine does for one URL
#[derive(Clone, Debug)]
pub enum Script {
    /// Report progress, then produce `/out/<last path segment>.mp4`
    Succeed(Vec<(u8, &'static str)>),
    /// Return a summary without an artifact
    NoOutput(&'static str),
    /// Raise a fault
    Fault(&'static str),
    /// Panic inside the engine
    Panic(&'static str),
    /// Block until the test calls [`ScriptedEngine::release`]
    Hold,
}

/// Engine following a per-URL script (default: succeed with `(50, "half")`)
pub struct ScriptedEngine {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
    hold_tx: Mutex<mpsc::Sender<()>>,
    hold_rx: Mutex<mpsc::Receiver<()>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let (hold_tx, hold_rx) = mpsc::channel();
        Self {
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            hold_tx: Mutex::new(hold_tx),
            hold_rx: Mutex::new(hold_rx),
        }
    }

    /// Script the behavior for `url`
    pub fn with(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }

    /// URLs the engine was called with, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Let one held call return successfully
    pub fn release(&self) {
        self.hold_tx.lock().unwrap().send(()).unwrap();
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingEngine for ScriptedEngine {
    fn process(
        &self,
        request: &EngineRequest,
        progress: &mut dyn FnMut(u8, &str),
    ) -> Result<EngineOutput, EngineFault> {
        self.calls.lock().unwrap().push(request.url.clone());

        let script = self
            .scripts
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Script::Succeed(vec![(50, "half")]));

        match script {
            Script::Succeed(steps) => {
                for (percent, status) in steps {
                    progress(percent, status);
                }
                Ok(EngineOutput::new("ok", artifact_for(&request.url)))
            }
            Script::NoOutput(summary) => Ok(EngineOutput::new(summary, "")),
            Script::Fault(message) => Err(EngineFault::new(message)),
            Script::Panic(message) => panic!("{}", message),
            Script::Hold => {
                progress(1, "holding");
                self.hold_rx
                    .lock()
                    .unwrap()
                    .recv()
                    .map_err(|_| EngineFault::new("hold channel closed"))?;
                Ok(EngineOutput::new("ok", artifact_for(&request.url)))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// `/out/<last path segment>.mp4`
pub fn artifact_for(url: &str) -> String {
    format!("/out/{}.mp4", url.rsplit('/').next().unwrap_or(url))
}
