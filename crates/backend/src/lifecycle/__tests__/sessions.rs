//! Session start/end scenarios across independent invocations.

#[cfg(test)]
mod tests {
  use std::io;

  use crate::lifecycle::{
    ServiceLauncher, ServiceState, StopOutcome,
    __tests__::helpers::LifecycleTestContext,
  };

  /// Launcher for scenarios where the service is already up
  struct NoLaunch;

  impl ServiceLauncher for NoLaunch {
    fn launch(&self) -> io::Result<()> {
      Err(io::Error::other("service should already be running"))
    }
  }

  /// Two overlapping sessions: the service survives the first exit and is
  /// stopped by the second.
  #[tokio::test]
  async fn test_overlapping_sessions_stop_on_last_exit() {
    let ctx = LifecycleTestContext::new();
    ctx.start_service(4000).await;

    let session_a = ctx.invocation();
    let session_b = ctx.invocation();

    assert_eq!(session_a.register_session().await, 1);
    assert_eq!(session_b.register_session().await, 2);

    // A exits first
    assert_eq!(session_a.release_session().await, StopOutcome::InUse { clients: 1 });
    assert_eq!(ctx.count_on_disk().as_deref(), Some("1"));
    assert!(ctx.pid_file().exists());
    assert!(ctx.processes.terminated().is_empty());

    // B exits last
    assert_eq!(session_b.release_session().await, StopOutcome::Stopped { pid: 4000 });
    assert_eq!(ctx.count_on_disk().as_deref(), Some("0"));
    assert!(!ctx.pid_file().exists());
    assert_eq!(ctx.processes.terminated(), vec![4000]);
    assert_eq!(ctx.invocation().state().await, ServiceState::Stopped);
  }

  /// N sessions started from separate invocations, released in a different
  /// order, always end with a zero count and a stopped service.
  #[tokio::test]
  async fn test_n_sessions_return_to_zero() {
    for n in [1_u64, 2, 5, 12] {
      let ctx = LifecycleTestContext::new();
      ctx.start_service(7000).await;

      let sessions: Vec<_> = (0..n).map(|_| ctx.invocation()).collect();
      for (i, session) in sessions.iter().enumerate() {
        assert_eq!(session.register_session().await, i as u64 + 1);
      }

      // Release odd-indexed sessions first, then the rest
      let order = sessions
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .chain(sessions.iter().enumerate().filter(|(i, _)| i % 2 == 0));

      let mut outcomes = Vec::new();
      for (_, session) in order {
        outcomes.push(session.release_session().await);
      }

      assert_eq!(outcomes.last(), Some(&StopOutcome::Stopped { pid: 7000 }), "n = {n}");
      assert!(
        outcomes[..outcomes.len() - 1]
          .iter()
          .all(|o| matches!(o, StopOutcome::InUse { .. })),
        "n = {n}: {outcomes:?}"
      );
      assert_eq!(ctx.invocation().counter().get().await, 0);
      assert_eq!(ctx.invocation().state().await, ServiceState::Stopped);
    }
  }

  /// A session joining while the last one exits registers before reusing
  /// the service, so the exiting session sees it still in use.
  #[tokio::test]
  async fn test_joining_session_registers_before_reuse() {
    let ctx = LifecycleTestContext::new();
    ctx.start_service(4242).await;

    let session_a = ctx.invocation();
    assert_eq!(session_a.register_session().await, 1);

    let session_b = ctx.invocation();
    assert_eq!(session_b.register_session().await, 2);
    assert_eq!(session_b.ensure_running(&NoLaunch).await.unwrap(), 4242);

    assert_eq!(session_a.release_session().await, StopOutcome::InUse { clients: 1 });
    assert!(ctx.processes.terminated().is_empty());
    assert_eq!(
      ctx.invocation().state().await,
      ServiceState::RunningWithClients { pid: 4242, clients: 1 }
    );

    assert_eq!(session_b.release_session().await, StopOutcome::Stopped { pid: 4242 });
  }

  /// A service that crashed leaves a PID file behind; the next invocation
  /// heals it instead of trying to stop a ghost.
  #[tokio::test]
  async fn test_crashed_service_is_recovered() {
    let ctx = LifecycleTestContext::new();
    ctx.start_service(5150).await;

    let session = ctx.invocation();
    session.register_session().await;

    ctx.processes.kill(5150);

    assert_eq!(session.release_session().await, StopOutcome::NotRunning);
    assert!(!ctx.pid_file().exists());
    assert_eq!(ctx.invocation().counter().get().await, 0);
  }

  /// A session that crashed before releasing keeps the service alive; the
  /// count only heals through a forced stop.
  #[tokio::test]
  async fn test_orphaned_reference_needs_force_stop() {
    let ctx = LifecycleTestContext::new();
    ctx.start_service(6000).await;

    // Session never reaches its release
    ctx.invocation().register_session().await;

    let other = ctx.invocation();
    other.register_session().await;
    assert_eq!(other.release_session().await, StopOutcome::InUse { clients: 1 });

    assert_eq!(ctx.invocation().force_stop().await, StopOutcome::Stopped { pid: 6000 });
    assert_eq!(ctx.invocation().counter().get().await, 0);
    assert!(ctx.count_on_disk().is_none());
  }

  /// Releases with no matching registration never push the count below zero.
  #[tokio::test]
  async fn test_extra_releases_clamp_at_zero() {
    let ctx = LifecycleTestContext::new();

    for _ in 0..3 {
      assert_eq!(ctx.invocation().release_session().await, StopOutcome::NotRunning);
    }
    assert_eq!(ctx.count_on_disk().as_deref(), Some("0"));
    assert_eq!(ctx.invocation().register_session().await, 1);
  }
}
