//! Scenario A (spec §8): a row-tumbling window of size 3 feeding a `Sum`
//! over input `(11,10),(12,20),...,(20,100)` should emit `60, 150, 240` —
//! the window fires once full, emits the burst as one outdated batch, and
//! starts over empty.

use pipefabric::element::{StreamElement, Tuple1};
use pipefabric::window::{SumI64, TumblingWindow, WindowAggregate, WindowKind};

#[test]
fn tumbling_row_window_sums_in_bursts_of_three() {
    let mut wa: WindowAggregate<Tuple1<i64>, SumI64> = WindowAggregate::new(
        Box::new(TumblingWindow::new(WindowKind::Row(3))),
        |t| t.a0,
    );

    let mut outputs = Vec::new();
    for (i, v) in (10..=100).step_by(10).enumerate() {
        let ts = 11 + i as u64;
        let elem = StreamElement::new(Tuple1::new(v), ts);
        let (snapshot, _) = wa.process(elem).unwrap();
        if let Some(sum) = snapshot {
            outputs.push(sum);
        }
    }

    assert_eq!(outputs, vec![60, 150, 240]);
}
