use std::{
    cell::RefCell,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use region_map::map_state::task_management::{
    task::{Completion, Job, Task, TaskFault},
    TaskManager, TaskManagerConfig,
};

type Log = Rc<RefCell<Vec<(u32, Result<u32, TaskFault>)>>>;

struct FnJob(Box<dyn FnOnce() -> u32 + Send>);

impl Job for FnJob {
    type Output = u32;

    fn run(self) -> u32 {
        (self.0)()
    }
}

struct Record {
    id: u32,
    log: Log,
    panics: bool,
}

impl Completion for Record {
    type Output = u32;

    fn on_complete(self, outcome: Result<u32, TaskFault>) {
        self.log.borrow_mut().push((self.id, outcome));
        if self.panics {
            panic!("completion {} failed", self.id);
        }
    }
}

struct Probe {
    id: u32,
    job: FnJob,
    log: Log,
    duplicate: bool,
    completion_panics: bool,
}

impl Probe {
    fn new(id: u32, log: &Log, body: impl FnOnce() -> u32 + Send + 'static) -> Self {
        Probe {
            id,
            job: FnJob(Box::new(body)),
            log: log.clone(),
            duplicate: false,
            completion_panics: false,
        }
    }

    fn echo(id: u32, log: &Log) -> Self {
        Probe::new(id, log, move || id)
    }
}

impl Task for Probe {
    type Job = FnJob;
    type Completion = Record;

    fn kind(&self) -> &'static str {
        if self.id % 2 == 0 {
            "even probe"
        } else {
            "odd probe"
        }
    }

    fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    fn split(self) -> (FnJob, Record) {
        (
            self.job,
            Record {
                id: self.id,
                log: self.log,
                panics: self.completion_panics,
            },
        )
    }
}

fn manager() -> TaskManager {
    TaskManager::new(TaskManagerConfig::default()).unwrap()
}

fn completed_ids(log: &Log) -> Vec<u32> {
    log.borrow().iter().map(|(id, _)| *id).collect()
}

fn drain_all(manager: &mut TaskManager) {
    assert!(manager.drain_until_empty_or(2000, Duration::from_millis(1)));
}

#[test]
fn completions_run_in_submission_order() {
    let log = Log::default();
    let mut manager = manager();
    let mut rng = fastrand::Rng::with_seed(3);

    for id in 0..50 {
        let pause = Duration::from_micros(rng.u64(0..500));
        manager.submit(Probe::new(id, &log, move || {
            thread::sleep(pause);
            id
        }));
    }
    drain_all(&mut manager);

    assert_eq!(completed_ids(&log), (0..50).collect::<Vec<_>>());
    assert!(log.borrow().iter().all(|(id, outcome)| outcome == &Ok(*id)));
}

#[test]
fn unfinished_head_holds_back_ready_tasks() {
    let log = Log::default();
    let mut manager = manager();
    let (release, gate) = mpsc::channel::<()>();
    let finished = Arc::new(AtomicUsize::new(0));

    manager.submit(Probe::new(1, &log, move || {
        let _ = gate.recv();
        1
    }));
    for id in 2..=4 {
        let finished = finished.clone();
        manager.submit(Probe::new(id, &log, move || {
            finished.fetch_add(1, Ordering::SeqCst);
            id
        }));
    }

    // the head is blocked, so nothing completes
    assert!(manager.drain_one());
    assert_eq!(manager.outstanding_count(), 4);

    release.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while finished.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }

    // every job has finished before any completion ran
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert!(log.borrow().is_empty());

    drain_all(&mut manager);
    assert_eq!(completed_ids(&log), vec![1, 2, 3, 4]);
}

#[test]
fn drain_one_reports_idle_on_empty_queue() {
    let mut manager = manager();
    assert!(manager.drain_one());
    assert!(manager.drain_until_empty_or(3, Duration::from_millis(1)));
}

#[test]
fn duplicates_never_run() {
    let log = Log::default();
    let mut manager = manager();
    let ran = Arc::new(AtomicBool::new(false));

    let ran_in_job = ran.clone();
    let mut duplicate = Probe::new(1, &log, move || {
        ran_in_job.store(true, Ordering::SeqCst);
        1
    });
    duplicate.duplicate = true;

    assert!(!manager.submit(duplicate));
    assert_eq!(manager.outstanding_count(), 0);

    assert!(manager.submit(Probe::echo(2, &log)));
    drain_all(&mut manager);

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(completed_ids(&log), vec![2]);
}

#[test]
fn panicking_job_still_completes() {
    let log = Log::default();
    let mut manager = manager();

    manager.submit(Probe::new(1, &log, || panic!("bad chunk data")));
    manager.submit(Probe::echo(2, &log));
    drain_all(&mut manager);

    let log = log.borrow();
    assert_eq!(
        log[0],
        (1, Err(TaskFault::Panicked("bad chunk data".to_string())))
    );
    assert_eq!(log[1], (2, Ok(2)));
}

#[test]
fn panicking_completion_does_not_stall_the_queue() {
    let log = Log::default();
    let mut manager = manager();

    let mut failing = Probe::echo(1, &log);
    failing.completion_panics = true;
    manager.submit(failing);
    manager.submit(Probe::echo(2, &log));
    drain_all(&mut manager);

    assert_eq!(completed_ids(&log), vec![1, 2]);
    assert_eq!(manager.outstanding_count(), 0);
}

#[test]
fn outstanding_tasks_are_counted_by_kind() {
    let log = Log::default();
    let mut manager = manager();
    let (release, gate) = mpsc::channel::<()>();

    manager.submit(Probe::new(1, &log, move || {
        let _ = gate.recv();
        1
    }));
    for id in 2..=6 {
        manager.submit(Probe::echo(id, &log));
    }

    assert_eq!(manager.outstanding_count(), 6);
    let counts = manager.outstanding_by_kind();
    assert_eq!(counts.get("odd probe"), Some(&3));
    assert_eq!(counts.get("even probe"), Some(&3));

    drop(release);
    drain_all(&mut manager);
    assert!(manager.outstanding_by_kind().is_empty());
}

#[test]
fn high_water_diagnostic_fires_once_per_crossing() {
    let log = Log::default();
    let mut manager = TaskManager::new(TaskManagerConfig {
        high_water_mark: 3,
        ..TaskManagerConfig::default()
    })
    .unwrap();
    let (release, gate) = mpsc::channel::<()>();

    manager.submit(Probe::new(0, &log, move || {
        let _ = gate.recv();
        0
    }));
    for id in 1..10 {
        manager.submit(Probe::echo(id, &log));
    }
    assert_eq!(manager.diagnostic_dumps(), 1);

    drop(release);
    drain_all(&mut manager);
    for id in 10..15 {
        manager.submit(Probe::echo(id, &log));
    }
    assert_eq!(manager.diagnostic_dumps(), 2);
}

#[test]
fn shutdown_drains_and_rejects_later_tasks() {
    let log = Log::default();
    let mut manager = manager();

    for id in 0..5 {
        manager.submit(Probe::echo(id, &log));
    }
    assert!(manager.shutdown());
    assert!(manager.is_closed());
    assert_eq!(completed_ids(&log), vec![0, 1, 2, 3, 4]);

    assert!(!manager.submit(Probe::echo(5, &log)));
    assert_eq!(manager.outstanding_count(), 0);
    assert!(manager.shutdown());
}

#[test]
fn shutdown_gives_up_on_a_wedged_worker() {
    let log = Log::default();
    let mut manager = TaskManager::new(TaskManagerConfig {
        shutdown_attempts: 3,
        shutdown_delay: Duration::from_millis(2),
        ..TaskManagerConfig::default()
    })
    .unwrap();
    let (release, gate) = mpsc::channel::<()>();

    manager.submit(Probe::new(1, &log, move || {
        let _ = gate.recv();
        1
    }));

    let started = Instant::now();
    assert!(!manager.shutdown());
    assert!(started.elapsed() >= Duration::from_millis(6));
    assert_eq!(manager.outstanding_count(), 1);
    assert!(log.borrow().is_empty());

    drop(release);
}
