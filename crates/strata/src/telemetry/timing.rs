// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;

/// Awaits `future` and returns its output with the time that elapsed on `clock`.
pub(crate) async fn timed<F>(clock: &Clock, future: F) -> (F::Output, Duration)
where
    F: Future,
{
    let start = clock.instant();
    let output = future.await;
    (output, clock.instant().saturating_duration_since(start))
}
