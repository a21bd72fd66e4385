//! End-to-end exercises of the ability runtime: pipe chains, cooperative
//! cancellation and the at-most-once lifecycle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use weaver_ability::{
    pipe, Ability, AbilityContext, AbilityError, AbilityHandle, AbilityInfo, AbilityType, Message,
    NullResolver,
};
use weaver_options::{OptionSpec, OptionValue};

/// Reverses incoming byte strings and forwards the result.
struct Invert;

#[async_trait]
impl Ability for Invert {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Invert piped string").with_kind(AbilityType::Component)
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        while !ctx.is_stopped() {
            match ctx.poll(Duration::from_millis(100)).await {
                Ok(true) => match ctx.recv().await {
                    Ok(msg) => {
                        let reversed: Vec<u8> = msg.iter().rev().copied().collect();
                        ctx.send(Bytes::from(reversed))?;
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }
        Ok(None)
    }
}

/// Appends every received message to a shared in-memory log.
struct Show {
    log: Arc<Mutex<Vec<Message>>>,
}

#[async_trait]
impl Ability for Show {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Display piped string").with_kind(AbilityType::Component)
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        while !ctx.is_stopped() {
            match ctx.poll(Duration::from_millis(100)).await {
                Ok(true) => match ctx.recv().await {
                    Ok(msg) => self.log.lock().unwrap().push(msg),
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        }
        Ok(None)
    }
}

/// Sleeps briefly, then hangs until stopped and reports completion.
struct Hello;

#[async_trait]
impl Ability for Hello {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Hello from a task")
    }

    fn option_list(&self) -> Vec<OptionSpec> {
        vec![OptionSpec::num(
            "sleep_ms",
            100i64,
            "delay before the hello message",
            false,
        )]
    }

    async fn main(
        &mut self,
        ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        let delay = ctx.get_opt("sleep_ms")?.as_int().unwrap_or(0) as u64;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        ctx.wait().await;
        Ok(Some(OptionValue::from("Done")))
    }
}

/// Runs in the caller's context and returns immediately.
struct Probe;

#[async_trait]
impl Ability for Probe {
    fn info(&self) -> AbilityInfo {
        AbilityInfo::new("Probe")
    }

    fn flavor(&self) -> weaver_ability::Flavor {
        weaver_ability::Flavor::Inline
    }

    async fn main(
        &mut self,
        _ctx: &mut AbilityContext,
    ) -> Result<Option<OptionValue>, AbilityError> {
        Ok(Some(OptionValue::from("probed")))
    }
}

fn handle(ability: impl Ability) -> AbilityHandle {
    AbilityHandle::new(Box::new(ability), Arc::new(NullResolver))
}

#[tokio::test]
async fn inline_flavor_completes_during_start() {
    let mut probe = handle(Probe);
    probe.start().await.unwrap();
    // No worker was spawned: the run is already over.
    assert!(probe.is_stopped());
    assert!(probe.join(Some(Duration::from_millis(10))).await);
    assert_eq!(probe.result(), Some(OptionValue::from("probed")));
}

#[tokio::test]
async fn chain_reverses_and_displays() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut invert = handle(Invert);
    let mut show = handle(Show { log: log.clone() });

    let (driver, reader) = pipe();
    invert.add_in_pipe(reader);
    let _ = &mut invert | &mut show;
    assert!(!invert.is_sink());
    assert!(!show.is_source());

    invert.start().await.unwrap();
    show.start().await.unwrap();
    driver.send(Message::from_static(b"abc")).unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while log.lock().unwrap().is_empty() {
        assert!(Instant::now() < deadline, "no message reached the display");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    invert.stop();
    show.stop();
    invert.join(None).await;
    show.join(None).await;

    assert_eq!(log.lock().unwrap().as_slice(), &[Message::from_static(b"cba")]);
}

#[tokio::test]
async fn producer_exit_propagates_end_of_stream() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut invert = handle(Invert);
    let mut show = handle(Show { log: log.clone() });

    let (driver, reader) = pipe();
    invert.add_in_pipe(reader);
    let _ = &mut invert | &mut show;

    invert.start().await.unwrap();
    show.start().await.unwrap();
    driver.send(Message::from_static(b"stream")).unwrap();
    driver.close();

    // The producer sees end-of-stream, closes its outbound pipe on exit,
    // and the consumer drains then exits on its own.
    invert.join(Some(Duration::from_secs(2))).await;
    assert!(show.join(Some(Duration::from_secs(2))).await);
    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[Message::from_static(b"maerts")]
    );
}

#[tokio::test]
async fn stop_unblocks_wait_quickly() {
    let mut hello = handle(Hello);
    let begin = Instant::now();
    hello.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    hello.stop();
    assert!(hello.join(Some(Duration::from_secs(1))).await);
    assert!(hello.is_stopped());
    assert!(begin.elapsed() < Duration::from_millis(500));
    assert_eq!(hello.result(), Some(OptionValue::from("Done")));
}

#[tokio::test]
async fn second_start_fails_without_a_second_worker() {
    let mut hello = handle(Hello);
    hello.set_opt("sleep_ms", 0i64).unwrap();
    hello.start().await.unwrap();
    assert!(matches!(
        hello.start().await,
        Err(AbilityError::AlreadyStarted(_))
    ));
    hello.stop();
    hello.join(None).await;
}

#[tokio::test]
async fn options_lock_while_running() {
    let mut hello = handle(Hello);
    hello.set_opt("sleep_ms", 300i64).unwrap();
    hello.start().await.unwrap();
    assert!(matches!(
        hello.set_opt("sleep_ms", 0i64),
        Err(AbilityError::OptionsLocked(_))
    ));
    hello.stop();
    hello.join(None).await;
}

#[tokio::test]
async fn result_absent_before_stop() {
    let mut hello = handle(Hello);
    hello.start().await.unwrap();
    assert_eq!(hello.result(), None);
    hello.stop();
    hello.join(None).await;
    assert_eq!(hello.result(), Some(OptionValue::from("Done")));
}
