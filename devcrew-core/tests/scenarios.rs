mod common;

use common::*;
use devcrew_core::error::{CreationError, PlanningError, ValidationError, Violation};
use devcrew_core::model::UnitStatus;
use devcrew_core::sink::MemorySink;
use devcrew_core::{
    ArchitecturePlanner, CoreConfig, ModuleCreator, Outcome, Phase, Pipeline, PythonAnalyzer, Role, RunLog,
    SystemArchitecture, SystemAssembler,
};

async fn plan(oracle: &ScriptedOracle, config: &CoreConfig) -> SystemArchitecture {
    ArchitecturePlanner::new(oracle, config).plan("Count things").await.unwrap()
}

#[tokio::test]
async fn test_dependents_see_extracted_interface() {
    let oracle = counting_oracle();
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);

    let mut creator = ModuleCreator::new(&oracle, &analyzer, &config);
    let results = creator.create_modules(&arch, &mut state).await.unwrap();

    assert!(results["counter.py"].is_completed());
    assert!(results["tracker.py"].is_completed());
    assert_eq!(state.status("tracker.py"), Some(UnitStatus::Completed));

    // `reset` was never planned; the tracker prompt must still offer it.
    let tracker_requests = oracle.requests_for(Role::ModuleEngineer, "tracker.py");
    assert_eq!(tracker_requests.len(), 1);
    let prompt = tracker_requests[0].render();
    assert!(prompt.contains("reset() -> None"));
    assert!(prompt.contains("increment(amount: int) -> int"));

    let assembler = SystemAssembler::new(&oracle, &analyzer, &config);
    let set = assembler.assemble(&arch, &results).await.unwrap();
    let integration = set.integration.completed().unwrap();
    assert_eq!(integration.class_name, "CountingAppIntegration");
    assert_eq!(integration.modules, vec!["counter.py", "tracker.py"]);
    assert_eq!(integration.retry_count, 0);
    assert!(set.omitted.is_empty());
    assert!(set.demo.is_completed());
    assert!(set.docs.is_completed());
    assert_eq!(set.tests.len(), 2);
    assert!(set.tests.values().all(Outcome::is_completed));
}

#[tokio::test]
async fn test_missing_signature_retried_with_feedback() {
    let arch = r#"{"system_name": "Calc", "modules": [
        {"name": "calc.py", "class_name": "Calc", "purpose": "Arithmetic",
         "interfaces": ["compute(x: int) -> int"]}]}"#;
    let wrong = "class Calc:\n    def add(self, x: int) -> int:\n        return x\n";
    let right = "class Calc:\n    def compute(self, x: int) -> int:\n        return x * 2\n";
    let oracle = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[arch])
        .script(Role::ModuleEngineer, "calc.py", &[&fenced(wrong), &fenced(right)]);
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);

    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    let result = results["calc.py"].completed().unwrap();
    assert_eq!(result.retry_count, 1);
    assert_eq!(result.report.history.len(), 1);
    assert!(result.source.contains("def compute"));

    let requests = oracle.requests_for(Role::ModuleEngineer, "calc.py");
    assert_eq!(requests.len(), 2);
    assert!(requests[0].feedback.is_none());
    let feedback = requests[1].feedback.as_deref().unwrap();
    assert!(feedback.contains("compute(x: int) -> int"));
    assert!(feedback.contains("def add"));
    assert!(requests[1].render().contains("Feedback from previous attempt"));
}

#[tokio::test]
async fn test_failed_module_isolated_from_siblings() {
    let arch = r#"{"system_name": "Solver Kit", "modules": [
        {"name": "c.py", "class_name": "Cee", "purpose": "Solves", "interfaces": ["solve(x: int) -> int"]},
        {"name": "d.py", "class_name": "Dee", "purpose": "Describes", "interfaces": ["describe() -> str"]}]}"#;
    let never = "class Cee:\n    def guess(self) -> int:\n        return 4\n";
    let dee = "class Dee:\n    def describe(self) -> str:\n        return 'dee'\n";
    let integration = r#"from d import Dee


class SolverKitIntegration:
    def __init__(self):
        self.dee = Dee()

    def describe(self) -> str:
        return self.dee.describe()
"#;
    let tests = "import unittest\nfrom d import Dee\n\nclass T(unittest.TestCase):\n    def test_describe(self):\n        self.assertEqual(Dee().describe(), 'dee')\n";
    let demo = "from system_integration import SolverKitIntegration\n\nprint(SolverKitIntegration().describe())\n";
    let oracle = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[arch])
        .script(Role::ModuleEngineer, "c.py", &[&fenced(never)])
        .script(Role::ModuleEngineer, "d.py", &[&fenced(dee)])
        .script(Role::Integrator, "system_integration.py", &[&fenced(integration)])
        .fallback(Role::TestEngineer, &fenced(tests))
        .fallback(Role::DemoEngineer, &fenced(demo))
        .fallback(Role::TechnicalWriter, "# Solver Kit\n");
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);

    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    assert_eq!(state.status("c.py"), Some(UnitStatus::Failed));
    assert_eq!(state.status("d.py"), Some(UnitStatus::Completed));
    assert_eq!(oracle.requests_for(Role::ModuleEngineer, "c.py").len(), 3);
    match &results["c.py"] {
        Outcome::Failed { last_attempt: Some(last), diagnostics } => {
            assert_eq!(last.retry_count, 2);
            assert!(last.source.contains("def guess"));
            assert!(diagnostics[0].contains("solve"));
            assert!(matches!(last.report.error, Some(ValidationError::Interface(_))));
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let set = SystemAssembler::new(&oracle, &analyzer, &config)
        .assemble(&arch, &results)
        .await
        .unwrap();
    assert_eq!(set.included, vec!["d.py"]);
    assert_eq!(set.omitted.len(), 1);
    assert_eq!(set.omitted[0].module, "c.py");
    assert!(set.integration.is_completed());
    assert!(!set.tests.contains_key("c.py"));
    let prompt = &oracle.requests_for(Role::Integrator, "system_integration.py")[0].prompt;
    assert!(prompt.contains("NOT available"));
    assert!(!prompt.contains("from c import"));
}

#[tokio::test]
async fn test_architecture_in_prose_is_decoded() {
    let reply = format!("Great question! Based on the requirements, here is my design:\n\n{COUNTING_ARCH}\n\nThis keeps concerns separate.");
    let oracle = ScriptedOracle::new().script(Role::Architect, "architecture.json", &[&reply]);
    let arch = plan(&oracle, &CoreConfig::default()).await;
    assert_eq!(arch.system_name, "Counting App");
    assert_eq!(arch.modules.len(), 2);
}

#[tokio::test]
async fn test_presentation_modules_removed_during_planning() {
    let arch = r#"{"system_name": "Shop", "modules": [
        {"name": "gui.py", "class_name": "Gui", "purpose": "Main window"},
        {"name": "cart.py", "class_name": "Cart", "purpose": "Cart rules", "dependencies": ["gui.py", "catalog.py"]},
        {"name": "catalog.py", "class_name": "Catalog", "purpose": "Product list", "dependencies": []},
        {"name": "build_tools.py", "class_name": "BuildTools", "purpose": "Packaging helpers"}]}"#;
    let oracle = ScriptedOracle::new().script(Role::Architect, "architecture.json", &[arch]);
    let arch = plan(&oracle, &CoreConfig::default()).await;
    let names: Vec<&str> = arch.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["cart.py", "catalog.py", "build_tools.py"]);
    assert_eq!(arch.module("cart.py").unwrap().dependencies, vec!["catalog.py"]);
}

#[tokio::test]
async fn test_cyclic_architecture_rejected() {
    let arch = r#"{"system_name": "Loop", "modules": [
        {"name": "a.py", "class_name": "A", "purpose": "a", "dependencies": ["b.py"]},
        {"name": "b.py", "class_name": "B", "purpose": "b", "dependencies": ["a.py"]}]}"#;
    let oracle = ScriptedOracle::new().script(Role::Architect, "architecture.json", &[arch]);
    let err = ArchitecturePlanner::new(&oracle, &CoreConfig::default())
        .plan("loop")
        .await
        .unwrap_err();
    assert!(matches!(err, PlanningError::Cycle(_)));
}

#[tokio::test]
async fn test_unparseable_architecture() {
    let oracle = ScriptedOracle::new().script(Role::Architect, "architecture.json", &["I cannot help with that."]);
    let err = ArchitecturePlanner::new(&oracle, &CoreConfig::default())
        .plan("x")
        .await
        .unwrap_err();
    match err {
        PlanningError::Parse(parse) => assert_eq!(parse.raw, "I cannot help with that."),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_rerun_on_completed_state_makes_no_calls() {
    let oracle = counting_oracle();
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let mut creator = ModuleCreator::new(&oracle, &analyzer, &config);

    let first = creator.create_modules(&arch, &mut state).await.unwrap();
    let calls = oracle.call_count();
    let second = creator.create_modules(&arch, &mut state).await.unwrap();

    assert_eq!(oracle.call_count(), calls);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_blocked_when_dependency_failed() {
    let arch = r#"{"system_name": "Stack", "modules": [
        {"name": "base.py", "class_name": "Base", "purpose": "base", "interfaces": ["load() -> dict"]},
        {"name": "top.py", "class_name": "Top", "purpose": "top", "dependencies": ["base.py"]}]}"#;
    let oracle = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[arch])
        .script(Role::ModuleEngineer, "base.py", &[&fenced("class Base:\n    pass\n")]);
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let mut creator = ModuleCreator::new(&oracle, &analyzer, &config);

    let blocked = match creator.create_modules(&arch, &mut state).await {
        Err(CreationError::Blocked(blocked)) => blocked,
        other => panic!("expected blocked, got {other:?}"),
    };
    assert_eq!(blocked.stuck.len(), 1);
    assert_eq!(blocked.stuck[0].module, "top.py");
    assert_eq!(blocked.stuck[0].unmet[0].name, "base.py");
    assert_eq!(blocked.stuck[0].unmet[0].status, Some(UnitStatus::Failed));
    assert!(oracle.requests_for(Role::ModuleEngineer, "top.py").is_empty());

    creator.fail_blocked(&mut state, &blocked);
    assert_eq!(state.status("top.py"), Some(UnitStatus::Failed));
    assert_eq!(creator.results()["top.py"].diagnostics(), ["dependency base.py is failed".to_string()]);
}

#[tokio::test]
async fn test_invented_integration_method_is_corrected() {
    let oracle = counting_oracle().script(
        Role::Integrator,
        "system_integration.py",
        &[&fenced(INVENTED_INTEGRATION_PY), &fenced(INTEGRATION_PY)],
    );
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    let set = SystemAssembler::new(&oracle, &analyzer, &config)
        .assemble(&arch, &results)
        .await
        .unwrap();
    let integration = set.integration.completed().unwrap();
    assert_eq!(integration.retry_count, 1);
    assert!(integration.report.history[0].contains("self.counter.rewind()"));

    let requests = oracle.requests_for(Role::Integrator, "system_integration.py");
    let feedback = requests[1].feedback.as_deref().unwrap();
    assert!(feedback.contains("`self.counter.rewind()` does not exist"));
    assert!(feedback.contains("increment"));
}

#[tokio::test]
async fn test_invented_method_on_injected_module_is_corrected() {
    let oracle = counting_oracle().script(
        Role::Integrator,
        "system_integration.py",
        &[&fenced(INJECTED_INVENTED_INTEGRATION_PY), &fenced(INTEGRATION_PY)],
    );
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    let set = SystemAssembler::new(&oracle, &analyzer, &config)
        .assemble(&arch, &results)
        .await
        .unwrap();
    let integration = set.integration.completed().unwrap();
    assert_eq!(integration.retry_count, 1);
    assert!(!integration.source.contains("rewind"));

    let requests = oracle.requests_for(Role::Integrator, "system_integration.py");
    assert_eq!(requests.len(), 2);
    let feedback = requests[1].feedback.as_deref().unwrap();
    assert!(feedback.contains("`self.counter.rewind()` does not exist"));
}

#[tokio::test]
async fn test_module_calling_missing_dependency_method_is_retried() {
    let invented = TRACKER_PY.replace("self.counter.increment(1)", "self.counter.bump()");
    let oracle = counting_oracle().script(
        Role::ModuleEngineer,
        "tracker.py",
        &[&fenced(&invented), &fenced(TRACKER_PY)],
    );
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    assert_eq!(results["tracker.py"].completed().unwrap().retry_count, 1);
    let feedback = oracle.requests_for(Role::ModuleEngineer, "tracker.py")[1].feedback.clone().unwrap();
    assert!(feedback.contains("`self.counter.bump()` does not exist"));
}

#[tokio::test]
async fn test_presentation_content_rejected_in_module() {
    let arch = r#"{"system_name": "Notes", "modules": [
        {"name": "notes.py", "class_name": "Notes", "purpose": "Stores notes", "interfaces": ["add(text: str) -> int"]}]}"#;
    let ui = "import gradio as gr\n\nclass Notes:\n    def add(self, text: str) -> int:\n        return 1\n";
    let clean = "class Notes:\n    def add(self, text: str) -> int:\n        return 1\n";
    let oracle = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[arch])
        .script(Role::ModuleEngineer, "notes.py", &[&fenced(ui), &fenced(clean)]);
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    assert_eq!(results["notes.py"].completed().unwrap().retry_count, 1);
    let feedback = oracle.requests_for(Role::ModuleEngineer, "notes.py")[1].feedback.clone().unwrap();
    assert!(feedback.contains("presentation-layer content"));
    assert!(feedback.contains("import gradio"));
}

#[tokio::test]
async fn test_syntax_errors_count_as_failed_attempts() {
    let arch = r#"{"system_name": "Notes", "modules": [
        {"name": "notes.py", "class_name": "Notes", "purpose": "Stores notes"}]}"#;
    let oracle = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[arch])
        .script(Role::ModuleEngineer, "notes.py", &[&fenced("class Notes(:\n    pass\n")]);
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig { max_retries: 1, ..Default::default() };
    let arch = plan(&oracle, &config).await;
    let mut state = ArchitecturePlanner::new(&oracle, &config).create_module_state(&arch);
    let results = ModuleCreator::new(&oracle, &analyzer, &config)
        .create_modules(&arch, &mut state)
        .await
        .unwrap();

    assert_eq!(oracle.requests_for(Role::ModuleEngineer, "notes.py").len(), 2);
    let Outcome::Failed { last_attempt: Some(last), .. } = &results["notes.py"] else {
        panic!("expected failure");
    };
    let Some(ValidationError::Interface(err)) = &last.report.error else {
        panic!("expected interface error");
    };
    assert!(matches!(err.violations[0], Violation::Unanalyzable { .. }));
}

#[tokio::test]
async fn test_pipeline_writes_all_artifacts() {
    let oracle = counting_oracle();
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let sink = MemorySink::new();
    let mut pipeline = Pipeline::new(&oracle, &analyzer, &sink, &config);

    let log = pipeline.run("Count things").await.unwrap();

    assert_eq!(pipeline.phase(), Phase::Complete);
    assert!(log.succeeded(), "failed units: {:?}", log.failed_units());
    for name in [
        "architecture.json",
        "counter.py",
        "tracker.py",
        "system_integration.py",
        "test_counter.py",
        "test_tracker.py",
        "app.py",
        "README.md",
        "run_log.json",
    ] {
        assert!(sink.get(name).is_some(), "missing {name}");
    }
    let stored = RunLog::from_json(&sink.get("run_log.json").unwrap()).unwrap();
    assert_eq!(stored.modules.len(), 2);
    assert!(stored.assembly.is_some());
}

#[tokio::test]
async fn test_resume_skips_completed_modules() {
    // First run dies when the oracle has nothing for tracker.py.
    let broken = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[COUNTING_ARCH])
        .script(Role::ModuleEngineer, "counter.py", &[&fenced(COUNTER_PY)]);
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let sink = MemorySink::new();
    let err = Pipeline::new(&broken, &analyzer, &sink, &config)
        .run("Count things")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tracker.py"));

    let log = RunLog::from_json(&sink.get("run_log.json").unwrap()).unwrap();
    assert_eq!(log.state.status("counter.py"), Some(UnitStatus::Completed));
    assert_eq!(log.state.status("tracker.py"), Some(UnitStatus::InProgress));

    let oracle = counting_oracle();
    let resumed = Pipeline::new(&oracle, &analyzer, &sink, &config).resume(log).await.unwrap();
    assert!(resumed.succeeded());
    assert!(oracle.requests_for(Role::ModuleEngineer, "counter.py").is_empty());
    assert_eq!(oracle.requests_for(Role::ModuleEngineer, "tracker.py").len(), 1);
    assert!(oracle.requests_for(Role::Architect, "architecture.json").is_empty());
}

#[tokio::test]
async fn test_pipeline_assembles_around_blocked_modules() {
    let arch = r#"{"system_name": "Layered", "modules": [
        {"name": "base.py", "class_name": "Base", "purpose": "base", "interfaces": ["load() -> dict"]},
        {"name": "top.py", "class_name": "Top", "purpose": "top", "dependencies": ["base.py"]},
        {"name": "side.py", "class_name": "Side", "purpose": "side", "interfaces": ["ping() -> str"]}]}"#;
    let side = "class Side:\n    def ping(self) -> str:\n        return \"pong\"\n";
    let integration = r#"from side import Side


class LayeredIntegration:
    def __init__(self, side: Side):
        self.side = side

    def ping(self) -> str:
        return self.side.ping()
"#;
    let oracle = ScriptedOracle::new()
        .script(Role::Architect, "architecture.json", &[arch])
        .script(Role::ModuleEngineer, "base.py", &[&fenced("class Base:\n    pass\n")])
        .script(Role::ModuleEngineer, "side.py", &[&fenced(side)])
        .script(Role::Integrator, "system_integration.py", &[&fenced(integration)])
        .fallback(
            Role::TestEngineer,
            &fenced("from side import Side\n\n\ndef test_ping():\n    assert Side().ping() == \"pong\"\n"),
        )
        .fallback(
            Role::DemoEngineer,
            &fenced("from side import Side\nfrom system_integration import LayeredIntegration\n\napp = LayeredIntegration(Side())\nprint(app.ping())\n"),
        )
        .fallback(Role::TechnicalWriter, "# Layered\n");
    let analyzer = PythonAnalyzer::new();
    let config = CoreConfig::default();
    let sink = MemorySink::new();
    let mut pipeline = Pipeline::new(&oracle, &analyzer, &sink, &config);

    let log = pipeline.run("Layered things").await.unwrap();

    assert_eq!(pipeline.phase(), Phase::Complete);
    let blocked = log.blocked.as_ref().unwrap();
    assert_eq!(blocked.stuck[0].module, "top.py");
    assert_eq!(log.state.status("base.py"), Some(UnitStatus::Failed));
    assert_eq!(log.state.status("top.py"), Some(UnitStatus::Failed));
    assert_eq!(log.state.status("side.py"), Some(UnitStatus::Completed));
    assert_eq!(log.modules["top.py"].diagnostics(), ["dependency base.py is failed".to_string()]);
    assert!(oracle.requests_for(Role::ModuleEngineer, "top.py").is_empty());

    let set = log.assembly.as_ref().unwrap();
    assert_eq!(set.integration.completed().unwrap().modules, vec!["side.py"]);
    assert_eq!(set.tests.keys().collect::<Vec<_>>(), vec!["side.py"]);
    assert!(set.demo.is_completed());
    let omitted: Vec<&str> = set.omitted.iter().map(|o| o.module.as_str()).collect();
    assert_eq!(omitted, vec!["base.py", "top.py"]);

    assert!(!log.succeeded());
    assert_eq!(log.failed_units(), vec!["module base.py", "module top.py"]);
    assert!(sink.get("side.py").is_some());
    assert!(sink.get("top.py").is_none());
    let stored = RunLog::from_json(&sink.get("run_log.json").unwrap()).unwrap();
    assert_eq!(stored.blocked.as_ref(), Some(blocked));
}
