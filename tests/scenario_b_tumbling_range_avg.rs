//! Scenario B (spec §8): a range-tumbling window of size 3 (timestamps in
//! seconds) feeding an `Avg` over input `(10,10),(11,20),...,(19,100)`
//! should emit `20, 50, 80` — the window closes and reopens instead of
//! sliding, so each emission averages exactly the three elements that
//! accumulated since the previous close.

use pipefabric::element::{StreamElement, Tuple1};
use pipefabric::window::{Avg, TumblingWindow, WindowAggregate, WindowKind};

#[test]
fn tumbling_range_window_averages_in_bursts_of_three() {
    let mut wa: WindowAggregate<Tuple1<i64>, Avg> = WindowAggregate::new(
        Box::new(TumblingWindow::new(WindowKind::Range(3))),
        |t| t.a0 as f64,
    );

    let mut outputs = Vec::new();
    for (i, v) in (10..=100).step_by(10).enumerate() {
        let ts = 10 + i as u64;
        let elem = StreamElement::new(Tuple1::new(v), ts);
        let (snapshot, _) = wa.process(elem).unwrap();
        if let Some(avg) = snapshot {
            outputs.push(avg);
        }
    }

    assert_eq!(outputs, vec![Some(20.0), Some(50.0), Some(80.0)]);
}
