#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use runstream::{EngineConfig, RunStream};

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Set { target: u8, value: i16 },
    SetPending { target: u8 },
    SetError { target: u8, value: i16 },
    ClearError { target: u8 },
    End { target: u8 },
    Run { source: u8, offset: i16 },
    Catch { source: u8 },
    ErrorRun { source: u8 },
    RunInto { source: u8, target: u8 },
}

fn pick(streams: &[RunStream<i32, i32>], index: u8) -> &RunStream<i32, i32> {
    &streams[usize::from(index) % streams.len()]
}

fuzz_target!(|input: Vec<FuzzOp>| {
    EngineConfig::default().with_max_updates(4096).install();
    let mut streams: Vec<RunStream<i32, i32>> = vec![RunStream::pending()];

    for op in input.into_iter().take(256) {
        match op {
            FuzzOp::Set { target, value } => pick(&streams, target).set(i32::from(value)),
            FuzzOp::SetPending { target } => pick(&streams, target).set_pending(),
            FuzzOp::SetError { target, value } => {
                pick(&streams, target).error().set(i32::from(value));
            }
            FuzzOp::ClearError { target } => pick(&streams, target).error().set_pending(),
            FuzzOp::End { target } => pick(&streams, target).end(),
            FuzzOp::Run { source, offset } => {
                let offset = i32::from(offset);
                let derived = pick(&streams, source).run(move |v| v.wrapping_add(offset));
                streams.push(derived);
            }
            FuzzOp::Catch { source } => {
                let derived = pick(&streams, source).catch(|e| e.wrapping_neg());
                streams.push(derived);
            }
            FuzzOp::ErrorRun { source } => {
                let derived = pick(&streams, source).error().run(|e| *e);
                streams.push(derived);
            }
            FuzzOp::RunInto { source, target } => {
                // Relaying into an upstream stream loops; the drain limit stops it.
                let target = pick(&streams, target).clone();
                let derived = pick(&streams, source).run_into(&target);
                streams.push(derived);
            }
        }

        assert!(!runstream_core::is_draining());
        for stream in &streams {
            let _ = stream.get();
        }
    }
});
