use crate::game::FlipOrigin;

/// 延时续体。所有挂起点都显式列在这里。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// 翻开的两张牌到时结算。
    SettlePair { origin: FlipOrigin },
    /// 电脑翻第一张。
    CpuTurn,
    /// 电脑翻第二张。
    CpuSecondFlip { index: usize },
    AnnounceGameOver,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scheduled {
    due_at: f64,
    seq: u64,
    generation: u64,
    task: Task,
}

/// 按到期时间执行的任务队列，带代号：每个任务记下安排时的代号，
/// `cancel_all` 换代之后旧任务不再出队，在下一次 `pop_due` 时清掉。
#[derive(Debug, Default)]
pub struct Scheduler {
    generation: u64,
    next_seq: u64,
    pending: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn schedule(&mut self, now: f64, delay_ms: u32, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Scheduled {
            due_at: now + f64::from(delay_ms),
            seq,
            generation: self.generation,
            task,
        });
    }

    pub fn cancel_all(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn live(&self) -> impl Iterator<Item = &Scheduled> + '_ {
        let generation = self.generation;
        self.pending
            .iter()
            .filter(move |scheduled| scheduled.generation == generation)
    }

    pub fn is_idle(&self) -> bool {
        self.live().next().is_none()
    }

    pub fn contains(&self, task: Task) -> bool {
        self.live().any(|scheduled| scheduled.task == task)
    }

    /// 取出本代最早到期的任务；同一时刻按安排顺序。
    pub fn pop_due(&mut self, now: f64) -> Option<Task> {
        let generation = self.generation;
        self.pending
            .retain(|scheduled| scheduled.generation == generation);
        let (slot, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due_at <= now)
            .min_by(|(_, a), (_, b)| {
                a.due_at
                    .total_cmp(&b.due_at)
                    .then_with(|| a.seq.cmp(&b.seq))
            })?;
        Some(self.pending.remove(slot).task)
    }

    pub fn next_due(&self) -> Option<f64> {
        self.live()
            .map(|scheduled| scheduled.due_at)
            .min_by(f64::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(0.0, 1500, Task::AnnounceGameOver);
        scheduler.schedule(0.0, 1000, Task::CpuTurn);
        scheduler.schedule(0.0, 1000, Task::CpuSecondFlip { index: 2 });

        assert_eq!(scheduler.next_due(), Some(1000.0));
        assert_eq!(scheduler.pop_due(999.0), None);
        assert_eq!(scheduler.pop_due(2000.0), Some(Task::CpuTurn));
        assert_eq!(
            scheduler.pop_due(2000.0),
            Some(Task::CpuSecondFlip { index: 2 })
        );
        assert_eq!(scheduler.pop_due(2000.0), Some(Task::AnnounceGameOver));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn cancel_all_bumps_generation() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(0.0, 10, Task::CpuTurn);
        let before = scheduler.generation();

        assert_eq!(scheduler.cancel_all(), before + 1);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.pop_due(1_000.0), None);
        assert_eq!(scheduler.next_due(), None);
    }

    #[test]
    fn only_the_current_generation_runs() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(0.0, 10, Task::CpuTurn);
        scheduler.schedule(0.0, 20, Task::CpuSecondFlip { index: 4 });
        scheduler.cancel_all();
        scheduler.schedule(0.0, 500, Task::AnnounceGameOver);

        assert!(!scheduler.contains(Task::CpuTurn));
        assert_eq!(scheduler.next_due(), Some(500.0));
        assert_eq!(scheduler.pop_due(100.0), None);
        assert_eq!(scheduler.pop_due(500.0), Some(Task::AnnounceGameOver));
        assert!(scheduler.is_idle());
        assert!(scheduler.pending.is_empty());
    }
}
