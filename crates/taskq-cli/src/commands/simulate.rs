//! `taskq simulate` — run one-shot and self-rescheduling tasks for a few rounds.

use std::cell::RefCell;
use std::rc::Rc;
use taskq::{Context, QueueConfig, Task, TaskError, TaskQueue};

pub struct SimulateArgs {
    pub tasks: usize,
    pub spinners: usize,
    pub rounds: usize,
}

/// What happened during one `proceed()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: usize,
    pub ran: Vec<String>,
    pub outstanding: usize,
}

type Trace = Rc<RefCell<Vec<String>>>;

struct Job {
    name: String,
    spin: bool,
    trace: Trace,
}

impl Task for Job {
    fn perform_task(&mut self, cx: &mut Context<'_>) -> Result<(), TaskError> {
        self.trace.borrow_mut().push(self.name.clone());
        if self.spin {
            cx.reschedule();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn run(config: &QueueConfig, args: &SimulateArgs) -> anyhow::Result<Vec<RoundReport>> {
    let trace = Trace::default();
    let mut queue = TaskQueue::with_config(config.clone());

    let spinners = (0..args.spinners).map(|i| (format!("spinner-{i}"), true));
    let one_shots = (0..args.tasks).map(|i| (format!("task-{i}"), false));
    for (name, spin) in spinners.chain(one_shots) {
        let id = queue.insert(Job {
            name,
            spin,
            trace: trace.clone(),
        })?;
        queue.schedule(id)?;
    }

    let mut reports = Vec::with_capacity(args.rounds);
    for round in 1..=args.rounds {
        queue.proceed()?;
        reports.push(RoundReport {
            round,
            ran: trace.borrow_mut().drain(..).collect(),
            outstanding: queue.outstanding_tasks(),
        });
    }
    Ok(reports)
}

pub fn execute(config: &QueueConfig, args: SimulateArgs) -> anyhow::Result<()> {
    println!(
        "Simulating {} one-shot and {} spinning tasks for {} rounds",
        args.tasks, args.spinners, args.rounds
    );
    for report in run(config, &args)? {
        println!(
            "round {:>3}: ran {:>3} [{}], {} outstanding",
            report.round,
            report.ran.len(),
            report.ran.join(" "),
            report.outstanding
        );
    }
    Ok(())
}
