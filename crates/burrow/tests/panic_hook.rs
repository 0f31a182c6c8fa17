//! The tracing panic hook. Kept in its own test binary because the panic
//! hook is process-wide.

use burrow::{install_panic_hook, CaptureBuffer, CommandSpec, Engine, FnCommand, ScriptedLines};

#[test]
fn test_recovered_panic_is_logged_through_tracing() {
    let logs = CaptureBuffer::new();
    let subscriber = {
        let logs = logs.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || logs.writer())
            .finish()
    };

    install_panic_hook();

    let out = CaptureBuffer::new();
    let engine = Engine::builder().output_writer(out.writer()).build();
    engine.register_command(FnCommand::new(CommandSpec::new("explode"), |_, _| {
        panic!("fuse lit")
    }));

    tracing::subscriber::with_default(subscriber, || {
        engine.run(&mut ScriptedLines::new(["explode"])).unwrap();
    });

    assert_eq!(out.contents(), "ERROR: command explode panicked: fuse lit\n");
    let logged = logs.contents();
    assert!(logged.contains("burrow::panic"), "{}", logged);
    assert!(logged.contains("panicked: fuse lit"), "{}", logged);
}
