use crate::config::Config;
use crate::errors::{DataHubError, Result};
use crate::services::data_service::{CycleReport, DataService};
use crate::session::SessionOpener;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Scraping,
    Publishing,
    /// 上一个周期失败；下一次触发开始时离开该状态
    Failed,
}

/// 最近一次周期的结果
#[derive(Debug, Clone)]
pub struct LastCycle {
    pub finished_at: DateTime<Utc>,
    pub outcome: std::result::Result<CycleReport, String>,
}

/// 固定时区下每天的若干触发时刻
#[derive(Debug, Clone)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
    tz: Tz,
}

impl DailySchedule {
    pub fn new(mut times: Vec<NaiveTime>, tz: Tz) -> Result<Self> {
        if times.is_empty() {
            return Err(DataHubError::ConfigError("Schedule needs at least one time".to_string()));
        }
        times.sort();
        times.dedup();
        Ok(Self { times, tz })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.schedule_times.clone(), config.timezone)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// `after` 之后（不含）最近的触发时刻
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after.with_timezone(&self.tz).date_naive();
        for offset in 0..=7 {
            let day = match today.checked_add_days(Days::new(offset)) {
                Some(day) => day,
                None => break,
            };
            for time in &self.times {
                // 夏令时跳过的本地时间不存在，直接跳过
                if let Some(local) = self.tz.from_local_datetime(&day.and_time(*time)).earliest() {
                    let candidate = local.with_timezone(&Utc);
                    if candidate > after {
                        return candidate;
                    }
                }
            }
        }
        after + chrono::Duration::days(1)
    }
}

struct Shared<O> {
    service: DataService<O>,
    state: Mutex<CycleState>,
    last_cycle: Mutex<Option<LastCycle>>,
    // 同一时刻最多一个周期在运行
    cycle_lock: tokio::sync::Mutex<()>,
}

impl<O: SessionOpener> Shared<O> {
    fn set_state(&self, state: CycleState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    async fn trigger(&self) -> Option<CycleReport> {
        let _guard = self.cycle_lock.lock().await;

        self.set_state(CycleState::Scraping);
        let result = match self.service.scrape().await {
            Ok(scraped) => {
                self.set_state(CycleState::Publishing);
                self.service
                    .publish(&scraped.snapshot)
                    .map(|_| CycleReport::from(&scraped))
            }
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(report) => {
                info!("Scrape cycle published: {:?}", report);
                self.set_state(CycleState::Idle);
                Ok(report)
            }
            Err(e) => {
                error!("Scrape cycle failed, previous snapshot kept: {}", e);
                self.set_state(CycleState::Failed);
                Err(e.to_string())
            }
        };

        let report = outcome.as_ref().ok().cloned();
        if let Ok(mut last) = self.last_cycle.lock() {
            *last = Some(LastCycle {
                finished_at: Utc::now(),
                outcome,
            });
        }
        report
    }
}

/// 定时刷新：按计划触发抓取周期，失败只记录日志，等待下一次触发
pub struct Orchestrator<O> {
    shared: Arc<Shared<O>>,
    schedule: DailySchedule,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl<O: SessionOpener + 'static> Orchestrator<O> {
    pub fn new(service: DataService<O>, schedule: DailySchedule) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                state: Mutex::new(CycleState::Idle),
                last_cycle: Mutex::new(None),
                cycle_lock: tokio::sync::Mutex::new(()),
            }),
            schedule,
            shutdown: None,
            task: None,
        }
    }

    pub fn state(&self) -> CycleState {
        self.shared
            .state
            .lock()
            .map(|state| *state)
            .unwrap_or(CycleState::Failed)
    }

    pub fn last_cycle(&self) -> Option<LastCycle> {
        self.shared.last_cycle.lock().ok().and_then(|last| last.clone())
    }

    /// 立即运行一个周期；若已有周期在运行则等待其结束后再运行
    pub async fn trigger(&self) -> Option<CycleReport> {
        self.shared.trigger().await
    }

    /// 在后台启动定时循环
    pub fn start(&mut self) {
        if self.task.is_some() {
            warn!("Orchestrator already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let schedule = self.schedule.clone();
        self.task = Some(tokio::spawn(run_loop(shared, schedule, rx)));
        self.shutdown = Some(tx);
        info!("Orchestrator started");
    }

    /// 停止定时循环；正在运行的周期会先完成
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Orchestrator task ended abnormally: {}", e);
            }
            info!("Orchestrator stopped");
        }
    }
}

async fn run_loop<O: SessionOpener>(
    shared: Arc<Shared<O>>,
    schedule: DailySchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut cursor = Utc::now();
    loop {
        let next = schedule.next_after(cursor);
        let now = Utc::now();

        if next > now {
            info!("Next scrape cycle at {}", next.with_timezone(&schedule.timezone()));
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
            cursor = next;
        } else {
            // 上一个周期运行期间错过的触发，合并为一次补跑
            info!("Trigger at {} was deferred by a running cycle, firing now", next);
            cursor = now;
        }

        shared.trigger().await;

        if *shutdown.borrow() {
            break;
        }
    }
}
