use proptest::prelude::*;
use std::sync::Arc;
use testloop::{
  order, MemoryReporter, NoHooks, Orchestrator, RecordingLogger, RunContext, Status,
  TestDescriptor,
};

#[derive(Debug, Clone)]
enum Behaviour {
  Pass,
  SetStatus(Vec<Status>),
  KnownToFail(Option<Status>),
  Error,
  Panic,
}

fn arb_status() -> impl Strategy<Value = Status> {
  prop_oneof![
    Just(Status::Pass),
    Just(Status::Skip),
    Just(Status::Ktf),
    Just(Status::Fail),
  ]
}

fn arb_behaviour() -> impl Strategy<Value = Behaviour> {
  prop_oneof![
    Just(Behaviour::Pass),
    prop::collection::vec(arb_status(), 0..6).prop_map(Behaviour::SetStatus),
    prop::option::of(arb_status()).prop_map(Behaviour::KnownToFail),
    Just(Behaviour::Error),
    Just(Behaviour::Panic),
  ]
}

fn descriptor(idx: usize, behaviour: Behaviour) -> TestDescriptor {
  TestDescriptor::new(
    format!("prop::t{idx}"),
    move |ctx: &mut RunContext| -> anyhow::Result<()> {
      match &behaviour {
        Behaviour::Pass => Ok(()),
        Behaviour::SetStatus(statuses) => {
          for status in statuses {
            ctx.set_status(*status);
          }
          Ok(())
        }
        Behaviour::KnownToFail(status) => {
          ctx.set_known_to_fail(true, "BUG-prop");
          if let Some(status) = status {
            ctx.set_status(*status);
          }
          Ok(())
        }
        Behaviour::Error => Err(anyhow::anyhow!("boom")),
        Behaviour::Panic => panic!("boom"),
      }
    },
  )
}

fn expected_status(behaviour: &Behaviour) -> Status {
  match behaviour {
    Behaviour::Pass => Status::Pass,
    Behaviour::SetStatus(statuses) => statuses.iter().copied().max().unwrap_or(Status::Pass),
    Behaviour::KnownToFail(None) | Behaviour::KnownToFail(Some(Status::Pass)) => Status::Fail,
    Behaviour::KnownToFail(Some(status)) => *status,
    Behaviour::Error | Behaviour::Panic => Status::Fail,
  }
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn counters_close_and_statuses_follow_precedence(
    behaviours in prop::collection::vec(arb_behaviour(), 0..8),
    loop_count in 1u32..4,
  ) {
    let schedule: Vec<_> = behaviours
      .iter()
      .cloned()
      .enumerate()
      .map(|(idx, behaviour)| descriptor(idx, behaviour))
      .collect();
    let orchestrator = Orchestrator::new("prop", Arc::new(RecordingLogger::new()));
    let mut reporter = MemoryReporter::new();
    let summary = orchestrator
      .run(&schedule, loop_count, &mut NoHooks, &mut reporter)
      .unwrap();

    prop_assert!(summary.counters.is_closed());
    prop_assert_eq!(summary.counters.total, behaviours.len() * loop_count as usize);
    for record in reporter.records() {
      prop_assert!(record.counters.is_closed());
    }

    for (idx, record) in reporter.records().iter().enumerate() {
      let behaviour = &behaviours[idx % behaviours.len()];
      prop_assert_eq!(record.status, expected_status(behaviour));
    }
  }

  #[test]
  fn ordering_is_a_stable_sort(sequences in prop::collection::vec(-3i64..3, 0..12)) {
    let descriptors: Vec<_> = sequences
      .iter()
      .enumerate()
      .map(|(idx, seq)| {
        let unit = |_ctx: &mut RunContext| -> anyhow::Result<()> { Ok(()) };
        TestDescriptor::new(format!("s{idx:02}"), unit).with_sequence(*seq)
      })
      .collect();

    let sorted = order(&descriptors, true, false);
    let mut expected: Vec<(i64, usize)> = sequences.iter().copied().zip(0..).collect();
    expected.sort();
    let actual: Vec<(i64, usize)> = sorted
      .iter()
      .map(|d| (d.sequence(), d.name()[1..].parse().unwrap()))
      .collect();
    prop_assert_eq!(actual, expected);
  }
}
