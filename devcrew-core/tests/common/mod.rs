#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use devcrew_core::{CodeSynthesisOracle, OracleRequest, Role};

/// Oracle that replays canned replies per `(role, target)`. The last reply
/// for a target repeats once the queue is down to one.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<(Role, String), VecDeque<String>>>,
    fallbacks: HashMap<Role, String>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, role: Role, target: &str, replies: &[&str]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert((role, target.to_string()), replies.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn fallback(mut self, role: Role, reply: &str) -> Self {
        self.fallbacks.insert(role, reply.to_string());
        self
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, role: Role, target: &str) -> Vec<OracleRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.role == role && r.target == target)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl CodeSynthesisOracle for ScriptedOracle {
    async fn synthesize(&self, request: &OracleRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(&(request.role, request.target.clone())) {
            let reply = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
            if let Some(reply) = reply {
                return Ok(reply);
            }
        }
        match self.fallbacks.get(&request.role) {
            Some(reply) => Ok(reply.clone()),
            None => anyhow::bail!("no scripted reply for {} {}", request.role, request.target),
        }
    }
}

pub fn fenced(source: &str) -> String {
    format!("Here is the implementation:\n\n```python\n{source}```\n\nLet me know if you need changes.")
}

pub const COUNTING_ARCH: &str = r#"{
  "system_name": "Counting App",
  "description": "Counts things",
  "modules": [
    {"name": "counter.py", "class_name": "Counter", "purpose": "Keeps a running count",
     "dependencies": [], "interfaces": ["increment(amount: int) -> int"], "priority": 1},
    {"name": "tracker.py", "class_name": "Tracker", "purpose": "Tracks calls to the counter",
     "dependencies": ["counter.py"], "interfaces": ["track() -> int"], "priority": 2}
  ],
  "assembly_instructions": "Tracker takes a Counter"
}"#;

pub const COUNTER_PY: &str = r#"class Counter:
    def __init__(self, start: int = 0):
        self.value = start

    def increment(self, amount: int) -> int:
        self.value += amount
        return self.value

    def reset(self) -> None:
        self.value = 0
"#;

pub const TRACKER_PY: &str = r#"from counter import Counter


class Tracker:
    def __init__(self, counter: Counter):
        self.counter = counter
        self.calls = 0

    def track(self) -> int:
        self.calls += 1
        return self.counter.increment(1)
"#;

pub const INTEGRATION_PY: &str = r#"from counter import Counter
from tracker import Tracker


class CountingAppIntegration:
    def __init__(self):
        self.counter = Counter()
        self.tracker = Tracker(self.counter)

    def track(self) -> int:
        return self.tracker.track()

    def reset(self) -> None:
        self.counter.reset()
"#;

pub const INVENTED_INTEGRATION_PY: &str = r#"from counter import Counter
from tracker import Tracker


class CountingAppIntegration:
    def __init__(self):
        self.counter = Counter()
        self.tracker = Tracker(self.counter)

    def track(self) -> int:
        return self.tracker.track()

    def reset(self) -> None:
        self.counter.rewind()
"#;

/// Wired by constructor injection; `reset` calls a method Counter lacks.
pub const INJECTED_INVENTED_INTEGRATION_PY: &str = r#"from counter import Counter
from tracker import Tracker


class CountingAppIntegration:
    def __init__(self, counter: Counter, tracker: Tracker):
        self.counter = counter
        self.tracker = tracker

    def track(self) -> int:
        return self.tracker.track()

    def reset(self) -> None:
        self.counter.rewind()
"#;

pub const TESTS_PY: &str = r#"import unittest
from counter import Counter
from tracker import Tracker


class TestModules(unittest.TestCase):
    def test_increment(self):
        counter = Counter()
        self.assertEqual(counter.increment(2), 2)

    def test_track(self):
        tracker = Tracker(Counter())
        self.assertEqual(tracker.track(), 1)


if __name__ == "__main__":
    unittest.main()
"#;

pub const DEMO_PY: &str = r#"from system_integration import CountingAppIntegration


def main():
    app = CountingAppIntegration()
    print(app.track())
    app.reset()


if __name__ == "__main__":
    main()
"#;

pub const README_MD: &str = "# Counting App\n\nRun `python app.py`.\n";

/// Oracle that builds the counting app on the first try.
pub fn counting_oracle() -> ScriptedOracle {
    ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[COUNTING_ARCH])
        .script(Role::ModuleEngineer, "counter.py", &[&fenced(COUNTER_PY)])
        .script(Role::ModuleEngineer, "tracker.py", &[&fenced(TRACKER_PY)])
        .script(Role::Integrator, "system_integration.py", &[&fenced(INTEGRATION_PY)])
        .fallback(Role::TestEngineer, &fenced(TESTS_PY))
        .fallback(Role::DemoEngineer, &fenced(DEMO_PY))
        .fallback(Role::TechnicalWriter, README_MD)
}
