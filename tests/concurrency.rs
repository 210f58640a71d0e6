//! Completion under randomized, concurrent finish orders.

use paintbucket::core::buffer::SharedBuffer;
use paintbucket::core::error::{RegionId, WorkerId};
use paintbucket::core::types::PixelFormat;
use paintbucket::pool::board::AssignmentBoard;
use paintbucket::pool::message::{CompletionNotification, Slot};
use paintbucket::pool::partition::assign;
use paintbucket::project::assignment::{Assignment, AssignmentState, Delivery};
use paintbucket::transforms::engine::apply_range;
use paintbucket::transforms::registry::TransformRegistry;
use proptest::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

fn finish_orders() -> impl Strategy<Value = (usize, Vec<usize>, Vec<bool>)> {
    (1usize..300, 1usize..9).prop_flat_map(|(pixels, workers)| {
        let order: Vec<usize> = (0..workers).collect();
        (
            Just(pixels),
            Just(order).prop_shuffle(),
            proptest::collection::vec(any::<bool>(), workers),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_byte_written_once_and_completion_fires_once(
        (pixels, order, repeat) in finish_orders()
    ) {
        let workers: Vec<WorkerId> = order.iter().map(|_| WorkerId::new()).collect();
        let ranges = assign(pixels, &workers);

        let assignment = Arc::new(Assignment::new(RegionId::new(), "brightness", 1.into()));
        assignment.advance();
        assignment.record_dispatch(ranges.iter().map(|&(worker_id, range)| Slot { worker_id, range }));
        prop_assert!(assignment.seal(None));
        let board = AssignmentBoard::new();
        board.register(assignment.clone());

        let buffer = Arc::new(SharedBuffer::from_bytes(&vec![0u8; pixels * 3]));
        let entry = Arc::new(TransformRegistry::with_builtins().get("brightness").cloned().unwrap());
        let barrier = Arc::new(Barrier::new(ranges.len()));

        // Threads start in shuffled order and race past a shared barrier.
        let handles: Vec<_> = order
            .iter()
            .filter_map(|&i| ranges.get(i).map(|&(worker_id, range)| (worker_id, range, repeat[i])))
            .map(|(worker_id, range, twice)| {
                let (assignment, board, buffer, entry, barrier) =
                    (assignment.clone(), board.clone(), buffer.clone(), entry.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    apply_range(&buffer, range, PixelFormat::Rgb, &entry, 1.0);
                    let note = CompletionNotification {
                        worker_id,
                        job_id: assignment.id(),
                        region_id: assignment.region_id(),
                        range,
                    };
                    let mut results = vec![board.deliver(&note)];
                    if twice {
                        results.push(board.deliver(&note));
                    }
                    results
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let completed = results.iter().filter(|r| matches!(r, Ok(Delivery::Completed))).count();
        prop_assert_eq!(completed, 1);
        prop_assert_eq!(assignment.state(), AssignmentState::Complete);
        prop_assert_eq!(assignment.completed(), assignment.dispatched());
        prop_assert!(buffer.to_vec().iter().all(|&b| b == 1));
    }
}

#[test]
fn ranges_are_disjoint_and_cover_the_buffer() {
    let workers: Vec<WorkerId> = (0..7).map(|_| WorkerId::new()).collect();
    for pixels in [1, 6, 7, 8, 50, 1000] {
        let ranges = assign(pixels, &workers);
        let mut next = 0;
        for (_, range) in &ranges {
            assert_eq!(range.start, next);
            assert!(!range.is_empty());
            next = range.end;
        }
        assert_eq!(next, pixels);
    }
}
