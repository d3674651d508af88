use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::rc::Rc;
use crate::ast::{Command, Pipeline};
use crate::parser::Assembler;
use super::{
    Binding, ExecError, ExecOutcome, Launcher, PipelineExecutor, StageIo, StageProcess, StageStatus,
    WaitPolicy,
};

/// Everything the mock launcher observed, shared with the test body.
#[derive(Default)]
struct Record {
    events: Vec<String>,
    stdout: String,
}

/// Runs each stage in-process at launch time: reads whatever its stdin is
/// bound to, appends its own argv as a line and writes the result to its
/// stdout binding. Inherited stdout lands in `Record::stdout`.
struct RecordingLauncher {
    record: Rc<RefCell<Record>>,
    next_id: u32,
}

struct RecordedStage {
    id: u32,
    name: String,
    status: StageStatus,
    record: Rc<RefCell<Record>>,
}

impl StageProcess for RecordedStage {
    fn id(&self) -> u32 {
        self.id
    }

    fn wait(&mut self) -> Result<StageStatus, ExecError> {
        self.record.borrow_mut().events.push(format!("wait {}", self.name));
        Ok(self.status)
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&mut self, cmd: &Command, io: StageIo) -> Result<Box<dyn StageProcess>, ExecError> {
        if cmd.program() == "nosuch" {
            return Err(ExecError::CommandNotFound(cmd.program().to_string()));
        }
        self.record.borrow_mut().events.push(format!("launch {}", cmd.program()));

        let mut text = String::new();
        match io.stdin {
            Binding::Inherit => {}
            Binding::Pipe(fd) => {
                File::from(fd).read_to_string(&mut text).unwrap();
            }
            Binding::File(path) => text = fs::read_to_string(path).unwrap(),
        }
        text.push_str(&cmd.argv().join(" "));
        text.push('\n');

        match io.stdout {
            Binding::Inherit => self.record.borrow_mut().stdout.push_str(&text),
            Binding::Pipe(fd) => File::from(fd).write_all(text.as_bytes()).unwrap(),
            Binding::File(path) => fs::write(path, &text).unwrap(),
        }

        self.next_id += 1;
        let status = if cmd.program() == "fail" {
            StageStatus::Exited(3)
        } else {
            StageStatus::Exited(0)
        };
        Ok(Box::new(RecordedStage {
            id: self.next_id,
            name: cmd.program().to_string(),
            status,
            record: Rc::clone(&self.record),
        }))
    }
}

fn executor(policy: WaitPolicy) -> (PipelineExecutor, Rc<RefCell<Record>>) {
    let record = Rc::new(RefCell::new(Record::default()));
    let launcher = RecordingLauncher {
        record: Rc::clone(&record),
        next_id: 0,
    };
    let executor = PipelineExecutor::new(Box::new(launcher), policy, "exit").unwrap();
    (executor, record)
}

fn pipeline(src: &str) -> Pipeline {
    Assembler::default().assemble_line(src).unwrap().unwrap()
}

#[test]
fn test_single_stage_uses_inherited_streams() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    assert_eq!(exec.exec(&pipeline("echo hi")).unwrap(), ExecOutcome::Code(0));
    assert_eq!(record.borrow().stdout, "echo hi\n");
}

#[test]
fn test_empty_pipeline_launches_nothing() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    let empty = Pipeline {
        stages: Vec::new(),
        redirection: Default::default(),
    };
    assert_eq!(exec.exec(&empty).unwrap(), ExecOutcome::Code(0));
    assert!(record.borrow().events.is_empty());
    assert!(exec.pipes().is_intact());
}

#[test]
fn test_two_stages_share_pipe_a() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    exec.exec(&pipeline("first | second")).unwrap();
    assert_eq!(record.borrow().stdout, "first\nsecond\n");
    assert!(exec.pipes().is_intact());
}

#[test]
fn test_long_pipeline_rotates_both_pipes() {
    for stages in 3..=6 {
        let (mut exec, record) = executor(WaitPolicy::Deferred);
        let names: Vec<String> = (0..stages).map(|i| format!("s{}", i)).collect();
        exec.exec(&pipeline(&names.join(" | "))).unwrap();

        let expected: String = names.iter().map(|n| format!("{}\n", n)).collect();
        assert_eq!(record.borrow().stdout, expected, "{} stages", stages);
        assert!(exec.pipes().is_intact());
    }
}

#[test]
fn test_deferred_policy_reaps_after_launching_everything() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    exec.exec(&pipeline("a | b | c")).unwrap();
    assert_eq!(
        record.borrow().events,
        vec!["launch a", "launch b", "launch c", "wait a", "wait b", "wait c"]
    );
}

#[test]
fn test_per_stage_policy_reaps_each_stage_in_turn() {
    let (mut exec, record) = executor(WaitPolicy::PerStage);
    exec.exec(&pipeline("a | b | c")).unwrap();
    assert_eq!(
        record.borrow().events,
        vec!["launch a", "wait a", "launch b", "wait b", "launch c", "wait c"]
    );
    assert_eq!(record.borrow().stdout, "a\nb\nc\n");
}

#[test]
fn test_status_comes_from_last_stage() {
    let (mut exec, _) = executor(WaitPolicy::Deferred);
    assert_eq!(exec.exec(&pipeline("fail | cat")).unwrap(), ExecOutcome::Code(0));
    assert_eq!(exec.exec(&pipeline("cat | fail")).unwrap(), ExecOutcome::Code(3));

    let (mut exec, _) = executor(WaitPolicy::PerStage);
    assert_eq!(exec.exec(&pipeline("cat | fail")).unwrap(), ExecOutcome::Code(3));
}

#[test]
fn test_exit_keyword_stops_before_launching() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    assert_eq!(exec.exec(&pipeline("exit")).unwrap(), ExecOutcome::Exit);
    assert!(record.borrow().events.is_empty());
}

#[test]
fn test_exit_keyword_mid_pipeline_reaps_earlier_stages() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    assert_eq!(exec.exec(&pipeline("a | b | exit | c")).unwrap(), ExecOutcome::Exit);
    assert_eq!(record.borrow().events, vec!["launch a", "launch b", "wait a", "wait b"]);
    assert!(exec.pipes().is_intact());
}

#[test]
fn test_custom_exit_keyword() {
    let record = Rc::new(RefCell::new(Record::default()));
    let launcher = RecordingLauncher {
        record: Rc::clone(&record),
        next_id: 0,
    };
    let mut exec = PipelineExecutor::new(Box::new(launcher), WaitPolicy::Deferred, "quit").unwrap();
    assert_eq!(exec.exec(&pipeline("exit")).unwrap(), ExecOutcome::Code(0));
    assert_eq!(exec.exec(&pipeline("quit")).unwrap(), ExecOutcome::Exit);
}

#[test]
fn test_missing_program_is_skipped_not_fatal() {
    let (mut exec, record) = executor(WaitPolicy::Deferred);
    // the consumer sees end-of-file since nobody took the write end
    assert_eq!(exec.exec(&pipeline("nosuch | b")).unwrap(), ExecOutcome::Code(0));
    assert_eq!(record.borrow().stdout, "b\n");

    assert_eq!(exec.exec(&pipeline("a | nosuch")).unwrap(), ExecOutcome::Code(127));
    assert!(exec.pipes().is_intact());
}

#[test]
fn test_redirections_bind_outer_stages() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, "from file\n").unwrap();

    let (mut exec, record) = executor(WaitPolicy::Deferred);
    let line = format!("a < {} | b | c > {}", input.display(), output.display());
    exec.exec(&pipeline(&line)).unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "from file\na\nb\nc\n");
    assert!(record.borrow().stdout.is_empty());
}

#[test]
fn test_pipes_stay_intact_over_many_pipelines() {
    let (mut exec, _) = executor(WaitPolicy::Deferred);
    let lines = ["a", "a | b", "a | b | c", "a | b | c | d", "a | nosuch | c", "a | exit"];
    for round in 0..50 {
        let line = lines[round % lines.len()];
        exec.exec(&pipeline(line)).unwrap();
        assert!(exec.pipes().is_intact(), "round {}: {}", round, line);
        assert_eq!(exec.pipes().raw_fds().len(), 4);
    }
}
