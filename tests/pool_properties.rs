//! Property tests for size classification, reset and large-object tracking

use proptest::prelude::*;
use regionpool::{Pool, PoolConfig, PoolError, POOL_ALIGNMENT};
use std::cell::RefCell;
use std::rc::Rc;

proptest! {
    #[test]
    fn small_requests_stay_inside_their_block(
        pool_size in 256_usize..8192,
        sizes in proptest::collection::vec(1_usize..6000, 1..40),
    ) {
        let mut pool = Pool::create(pool_size).unwrap();
        let max = pool.max();
        prop_assert!(max > 0 && max <= regionpool::PAGE_SIZE);

        let mut live = Vec::new();
        for (i, &size) in sizes.iter().enumerate() {
            let p = pool.alloc(size).unwrap();
            let addr = p.as_ptr() as usize;
            prop_assert_eq!(addr % POOL_ALIGNMENT, 0);

            if size <= max {
                let blocks = pool.blocks();
                let block = blocks.iter().find(|b| b.contains(addr));
                prop_assert!(block.is_some());
                prop_assert!(addr + size <= block.unwrap().end);
            } else {
                prop_assert!(!pool.contains(p.as_ptr()));
            }

            unsafe { core::ptr::write_bytes(p.as_ptr(), i as u8, size) };
            live.push((p, size, i as u8));
        }

        // No allocation overwrote another
        for (p, size, tag) in live {
            let bytes = unsafe { core::slice::from_raw_parts(p.as_ptr(), size) };
            prop_assert!(bytes.iter().all(|&b| b == tag));
        }
    }

    #[test]
    fn unaligned_requests_never_leave_gaps(
        sizes in proptest::collection::vec(1_usize..64, 1..20),
    ) {
        let mut pool = Pool::create(4096).unwrap();
        let mut expected = pool.alloc_unaligned(0).unwrap().as_ptr() as usize;

        for size in sizes {
            let p = pool.alloc_unaligned(size).unwrap().as_ptr() as usize;
            prop_assert_eq!(p, expected);
            expected = p + size;
        }
    }

    #[test]
    fn reset_reclaims_everything_without_new_blocks(
        sizes in proptest::collection::vec(1_usize..3000, 1..60),
    ) {
        // current never advances, so both passes scan the same chain
        let config = PoolConfig::new(1024).with_failed_threshold(u32::MAX);
        let mut pool = Pool::with_config(&config).unwrap();

        for &size in &sizes {
            pool.alloc(size).unwrap();
        }
        let grown = pool.blocks().len();

        pool.reset();
        let stats = pool.stats();
        prop_assert_eq!(stats.small_used, 0);
        prop_assert_eq!(stats.large_live, 0);
        prop_assert_eq!(stats.blocks, grown);
        prop_assert_eq!(pool.current_block(), 0);

        for &size in &sizes {
            pool.alloc(size).unwrap();
        }
        prop_assert_eq!(pool.blocks().len(), grown);
    }

    #[test]
    fn freed_large_allocations_are_declined_twice(
        count in 1_usize..12,
        free_mask in any::<u16>(),
    ) {
        let mut pool = Pool::create(512).unwrap();
        let size = pool.max() + 1;
        let ptrs: Vec<_> = (0..count).map(|_| pool.alloc(size).unwrap()).collect();

        let mut freed = 0;
        for (i, &p) in ptrs.iter().enumerate() {
            if free_mask & (1 << i) != 0 {
                prop_assert_eq!(pool.free_large(p), Ok(()));
                prop_assert_eq!(
                    pool.free_large(p),
                    Err(PoolError::NotFound { addr: p.as_ptr() as usize })
                );
                freed += 1;
            }
        }

        let stats = pool.stats();
        prop_assert_eq!(stats.large_live, count - freed);
        prop_assert_eq!(stats.large_tombstones, freed);
    }

    #[test]
    fn destroy_runs_each_cleanup_once_newest_first(count in 0_usize..50) {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut pool = Pool::create(1024).unwrap();

        for id in 0..count {
            let order = Rc::clone(&order);
            pool.on_destroy(move || order.borrow_mut().push(id)).unwrap();
        }
        pool.destroy();

        let expected: Vec<_> = (0..count).rev().collect();
        prop_assert_eq!(&*order.borrow(), &expected);
    }
}
