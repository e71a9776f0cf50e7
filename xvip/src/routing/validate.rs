// SPDX-FileCopyrightText: 2025 Contributors to the Xilinx Video Pipeline project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{MAX_ROUTES, Route, RoutingRestriction};
use crate::{Error, Result, graph::PadKind, stream::check_stream};

/// Checks a requested routing table against an entity's pads and
/// restrictions.
///
/// Inactive routes are checked for well-formedness only; they never count
/// towards fan-out, fan-in or duplicate detection.
///
/// # Arguments
///
/// * `routes` - The requested table
/// * `pads` - The pads of the entity, by index
/// * `restriction` - Routing shapes the entity refuses
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the table has more than
/// [`MAX_ROUTES`] entries, a route references a missing pad or a pad of the
/// wrong polarity, a stream id does not fit a stream mask, an active route is
/// repeated, or an active route violates `restriction`.
///
/// # Examples
///
/// ```
/// use xvip::graph::PadKind;
/// use xvip::routing::{validate, Route, RoutingRestriction};
///
/// let pads = [PadKind::Sink, PadKind::Source, PadKind::Source];
/// let fan_out = [Route::new(0, 0, 1, 0), Route::new(0, 0, 2, 0)];
/// assert!(validate(&fan_out, &pads, RoutingRestriction::NONE).is_ok());
/// assert!(validate(&fan_out, &pads, RoutingRestriction::NO_1_TO_N).is_err());
/// ```
pub fn validate(routes: &[Route], pads: &[PadKind], restriction: RoutingRestriction) -> Result<()> {
    if routes.len() > MAX_ROUTES {
        return Err(Error::InvalidArgument(format!(
            "{} routes exceed the limit of {MAX_ROUTES}",
            routes.len()
        )));
    }

    let mut by_sink: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
    let mut by_source: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
    let mut seen: HashSet<((u32, u32), (u32, u32))> = HashSet::new();

    for route in routes {
        check_pad(pads, route.sink_pad, PadKind::Sink, route)?;
        check_pad(pads, route.source_pad, PadKind::Source, route)?;
        check_stream(route.sink_stream)?;
        check_stream(route.source_stream)?;

        if !route.active {
            continue;
        }

        let sink = (route.sink_pad, route.sink_stream);
        let source = (route.source_pad, route.source_stream);

        if restriction.contains(RoutingRestriction::NO_STREAM_MIX)
            && route.sink_stream != route.source_stream
        {
            return Err(invalid(route, "stream mixing is not allowed"));
        }

        if !seen.insert((sink, source)) {
            return Err(invalid(route, "duplicate route"));
        }
        if by_sink.contains_key(&sink) && restriction.contains(RoutingRestriction::NO_1_TO_N) {
            return Err(invalid(route, "sink stream is already routed (no 1-to-N)"));
        }
        if by_source.contains_key(&source) && restriction.contains(RoutingRestriction::NO_N_TO_1)
        {
            return Err(invalid(route, "source stream is already fed (no N-to-1)"));
        }

        by_sink.entry(sink).or_insert(source);
        by_source.entry(source).or_insert(sink);
    }

    debug!(routes = routes.len(), "routing table validated");
    Ok(())
}

fn check_pad(pads: &[PadKind], pad: u32, expected: PadKind, route: &Route) -> Result<()> {
    match pads.get(pad as usize) {
        Some(kind) if *kind == expected => Ok(()),
        Some(_) => Err(invalid(route, &format!("pad {pad} is not a {expected:?} pad"))),
        None => Err(invalid(route, &format!("pad {pad} does not exist"))),
    }
}

fn invalid(route: &Route, reason: &str) -> Error {
    Error::InvalidArgument(format!("route {route}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWITCH_PADS: [PadKind; 4] = [PadKind::Sink, PadKind::Sink, PadKind::Source, PadKind::Source];

    #[test]
    fn fan_in_rejected_when_forbidden() {
        let routes = [Route::new(0, 0, 2, 0), Route::new(1, 0, 2, 0)];
        assert!(validate(&routes, &SWITCH_PADS, RoutingRestriction::NO_1_TO_N).is_ok());
        assert!(validate(&routes, &SWITCH_PADS, RoutingRestriction::NO_N_TO_1).is_err());
    }

    #[test]
    fn stream_mixing() {
        let routes = [Route::new(0, 1, 2, 0)];
        assert!(validate(&routes, &SWITCH_PADS, RoutingRestriction::ONLY_1_TO_1).is_ok());
        assert!(validate(&routes, &SWITCH_PADS, RoutingRestriction::NO_STREAM_MIX).is_err());
    }

    #[test]
    fn inactive_routes_do_not_conflict() {
        let routes = [Route::new(0, 0, 2, 0), Route::new(0, 0, 3, 0).inactive()];
        assert!(validate(&routes, &SWITCH_PADS, RoutingRestriction::ONLY_1_TO_1).is_ok());
    }

    #[test]
    fn malformed_routes() {
        let cases = [
            Route::new(2, 0, 3, 0),
            Route::new(0, 0, 1, 0),
            Route::new(0, 0, 9, 0),
            Route::new(0, 64, 2, 0),
        ];
        for route in cases {
            assert!(
                validate(&[route], &SWITCH_PADS, RoutingRestriction::NONE).is_err(),
                "{route} accepted"
            );
        }
        let dup = [Route::new(0, 0, 2, 0), Route::new(0, 0, 2, 0)];
        assert!(validate(&dup, &SWITCH_PADS, RoutingRestriction::NONE).is_err());

        // A repeat behind a legal fan-out is still a repeat.
        let fanned = [
            Route::new(0, 0, 2, 0),
            Route::new(0, 0, 3, 0),
            Route::new(0, 0, 3, 0),
        ];
        let err = validate(&fanned, &SWITCH_PADS, RoutingRestriction::NONE).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn table_size_is_bounded() {
        let routes: Vec<_> = (0..=MAX_ROUTES as u32).map(|s| Route::new(0, s % 64, 2, s % 64)).collect();
        let err = validate(&routes, &SWITCH_PADS, RoutingRestriction::NONE).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }
}
