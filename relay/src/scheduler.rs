use std::{collections::HashMap, time::Duration};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use relay_common::{FireMode, Schedule};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::RelayContext;

/// Decides, tick by tick, whether the schedule calls for conditioning.
#[derive(Debug)]
pub struct Scheduler {
    fire_mode: FireMode,
    // start time-of-day -> date its window last fired
    fired: HashMap<NaiveTime, NaiveDate>,
}

impl Scheduler {
    pub fn new(fire_mode: FireMode) -> Self {
        Self {
            fire_mode,
            fired: HashMap::new(),
        }
    }

    pub fn evaluate(&mut self, schedule: &Schedule, now: NaiveDateTime) -> bool {
        self.fired
            .retain(|start, _| schedule.entries().iter().any(|entry| entry.start() == *start));

        let mut due = schedule.due_entries(now.time()).peekable();
        if due.peek().is_none() {
            return false;
        }

        match self.fire_mode {
            FireMode::EveryTick => true,
            FireMode::OncePerWindow => {
                let mut fire = false;
                for entry in due {
                    let opened = entry.window_opened_on(now);
                    if self.fired.insert(entry.start(), opened) != Some(opened) {
                        fire = true;
                    }
                }
                fire
            }
        }
    }
}

/// Runs one scheduler tick against the shared state. Returns whether
/// conditioning was triggered.
pub async fn tick(ctx: &RelayContext, scheduler: &mut Scheduler, now: NaiveDateTime) -> bool {
    let mut relay = ctx.lock().await;
    if !scheduler.evaluate(relay.state().schedule(), now) {
        return false;
    }

    let delivery = relay.begin_conditioning();
    info!(
        "scheduled charging and heating started at {} ({} frames sent)",
        now.format("%H:%M"),
        delivery.delivered
    );
    true
}

pub fn spawn_scheduler(ctx: RelayContext) -> JoinHandle<()> {
    let config = ctx.config().scheduler.clone();
    let timezone = resolve_timezone(&ctx.config().timezone);

    tokio::spawn(async move {
        let mut scheduler = Scheduler::new(config.fire_mode);
        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_seconds));
        info!(
            "scheduler running every {}s in {timezone}",
            config.interval_seconds
        );

        loop {
            interval.tick().await;
            let now = Utc::now().with_timezone(&timezone).naive_local();
            if !tick(&ctx, &mut scheduler, now).await {
                debug!("no schedule entry due at {}", now.format("%H:%M:%S"));
            }
        }
    })
}

pub fn resolve_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or_else(|err| {
        warn!("unknown timezone {name:?} ({err}); falling back to UTC");
        Tz::UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_common::{OutboundMessage, RelayConfig};

    use crate::registry::PeerHandle;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn eight_am() -> Schedule {
        Schedule::parse(&["2023-04-17T08:00:00"]).unwrap()
    }

    #[test]
    fn fires_inside_the_window_only() {
        let mut scheduler = Scheduler::new(FireMode::EveryTick);
        let schedule = eight_am();

        assert!(!scheduler.evaluate(&schedule, at(7, 59, 50)));
        assert!(scheduler.evaluate(&schedule, at(8, 0, 0)));
        assert!(scheduler.evaluate(&schedule, at(8, 1, 0)));
        assert!(scheduler.evaluate(&schedule, at(8, 1, 59)));
        assert!(!scheduler.evaluate(&schedule, at(8, 2, 0)));
    }

    #[test]
    fn every_tick_mode_refires_within_the_window() {
        let mut scheduler = Scheduler::new(FireMode::EveryTick);
        let schedule = eight_am();

        let fired = (0..12)
            .filter(|step| scheduler.evaluate(&schedule, at(8, step / 6, (step % 6) * 10)))
            .count();
        assert_eq!(fired, 12);
    }

    #[test]
    fn once_per_window_fires_once_then_rearms_next_day() {
        let mut scheduler = Scheduler::new(FireMode::OncePerWindow);
        let schedule = eight_am();

        assert!(scheduler.evaluate(&schedule, at(8, 0, 0)));
        assert!(!scheduler.evaluate(&schedule, at(8, 0, 10)));
        assert!(!scheduler.evaluate(&schedule, at(8, 1, 50)));

        let tomorrow = at(8, 0, 5) + chrono::Duration::days(1);
        assert!(scheduler.evaluate(&schedule, tomorrow));
    }

    #[test]
    fn once_per_window_treats_midnight_wrap_as_one_window() {
        let mut scheduler = Scheduler::new(FireMode::OncePerWindow);
        let schedule = Schedule::parse(&["2023-04-17T23:59:00"]).unwrap();

        assert!(scheduler.evaluate(&schedule, at(23, 59, 30)));
        let after_midnight = at(0, 0, 10) + chrono::Duration::days(1);
        assert!(!scheduler.evaluate(&schedule, after_midnight));
    }

    #[test]
    fn replaced_schedule_forgets_old_windows() {
        let mut scheduler = Scheduler::new(FireMode::OncePerWindow);
        let morning = eight_am();
        let evening = Schedule::parse(&["2023-04-17T18:30:00"]).unwrap();

        assert!(scheduler.evaluate(&morning, at(8, 0, 0)));
        assert_eq!(scheduler.fired.len(), 1);

        assert!(!scheduler.evaluate(&evening, at(8, 0, 10)));
        assert!(scheduler.fired.is_empty());

        // Restoring the old entry inside the same window fires again.
        assert!(scheduler.evaluate(&morning, at(8, 1, 0)));
    }

    #[test]
    fn duplicate_entries_fire_once_per_tick() {
        let mut scheduler = Scheduler::new(FireMode::EveryTick);
        let schedule = Schedule::default();

        assert!(scheduler.evaluate(&schedule, at(8, 0, 0)));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Mars/Olympus_Mons"), Tz::UTC);
        assert_eq!(resolve_timezone("Europe/Warsaw"), Tz::Europe__Warsaw);
    }

    #[tokio::test]
    async fn tick_broadcasts_conditioning() {
        let ctx = RelayContext::new(RelayConfig::default());
        let (car, mut car_rx) = PeerHandle::channel(1, 16);
        let (app, mut app_rx) = PeerHandle::channel(2, 16);
        {
            let mut relay = ctx.lock().await;
            relay.peers.add_vehicle(car);
            relay.peers.add_app(app);
        }
        let mut scheduler = Scheduler::new(FireMode::EveryTick);

        assert!(!tick(&ctx, &mut scheduler, at(12, 0, 0)).await);
        assert!(car_rx.try_recv().is_err());

        assert!(tick(&ctx, &mut scheduler, at(8, 0, 0)).await);

        let mut car_frames = Vec::new();
        while let Ok(frame) = car_rx.try_recv() {
            car_frames.push(serde_json::from_str::<OutboundMessage>(&frame).unwrap());
        }
        assert_eq!(
            car_frames,
            vec![
                OutboundMessage::TemperatureSet { temp: 20.0 },
                OutboundMessage::TemperatureState { state: true },
                OutboundMessage::ChargingState { charging: true },
            ]
        );
        assert_eq!(
            serde_json::from_str::<OutboundMessage>(&app_rx.try_recv().unwrap()).unwrap(),
            OutboundMessage::TemperatureState { state: true }
        );

        let status = ctx.status().await;
        assert!(status.battery.charging);
        assert!(status.temperature.control);
    }
}
