//! Unit tests for ls-core.

#[cfg(test)]
mod ids {
    use crate::{EntityId, WorkerId};

    #[test]
    fn default_is_invalid_sentinel() {
        assert_eq!(EntityId::default(), EntityId::INVALID);
        assert_eq!(WorkerId::default(), WorkerId::INVALID);
    }

    #[test]
    fn index_round_trip() {
        let w = WorkerId(7);
        assert_eq!(w.index(), 7);
        assert_eq!(WorkerId::try_from(7usize).unwrap(), w);
    }

    #[test]
    fn display_names_the_type() {
        assert_eq!(format!("{}", WorkerId(3)), "WorkerId(3)");
        assert_eq!(format!("{}", EntityId(12)), "EntityId(12)");
    }

    #[test]
    fn ids_sort_by_inner_value() {
        let mut v = vec![EntityId(5), EntityId(1), EntityId(3)];
        v.sort();
        assert_eq!(v, vec![EntityId(1), EntityId(3), EntityId(5)]);
    }
}

#[cfg(test)]
mod time {
    use crate::{KernelConfig, Tick, TickClock};

    #[test]
    fn tick_arithmetic() {
        let t = Tick(10);
        assert_eq!(t.offset(5), Tick(15));
        assert_eq!(Tick(15).since(t), 5);
        assert_eq!(Tick(15) - t, 5);
        assert_eq!(t + 2, Tick(12));
    }

    #[test]
    fn macro_boundary_detection() {
        assert!(Tick(0).is_macro_boundary(5));
        assert!(Tick(10).is_macro_boundary(5));
        assert!(!Tick(7).is_macro_boundary(5));
        assert!(!Tick(7).is_macro_boundary(0)); // degenerate step never matches
    }

    #[test]
    fn clock_produces_millis() {
        let mut clock = TickClock::new(250);
        clock.advance_by(4);
        let ts = clock.timeslice();
        assert_eq!(ts.tick, Tick(4));
        assert_eq!(ts.millis, 1000);
    }

    #[test]
    fn clock_advances_by_step() {
        let mut clock = TickClock::new(100);
        clock.advance_by(3);
        clock.advance_by(3);
        assert_eq!(clock.current, Tick(6));
    }

    #[test]
    fn config_end_tick_is_exclusive_bound() {
        let cfg = KernelConfig { tick_millis: 100, total_ticks: 50 };
        assert_eq!(cfg.end_tick(), Tick(50));
        assert_eq!(cfg.make_clock().tick_millis, 100);
    }
}
