use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use corio::Runtime;

mod util;

use util::init;

#[test]
fn sleep_ordering() {
    init();

    let rt = Runtime::new().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    {
        let h = rt.handle().clone();
        let order = order.clone();
        rt.handle().spawn(async move {
            h.sleep(0.02).await;
            order.borrow_mut().push("A");
            h.stop();
        });
    }
    {
        let h = rt.handle().clone();
        let order = order.clone();
        rt.handle().spawn(async move {
            h.sleep(0.01).await;
            order.borrow_mut().push("B");
        });
    }

    rt.run().unwrap();
    assert_eq!(*order.borrow(), vec!["B", "A"]);
}

#[test]
fn equal_deadlines_fire_in_spawn_order() {
    init();

    let rt = Runtime::new().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    for i in 0..3 {
        let h = rt.handle().clone();
        let order = order.clone();
        rt.handle().spawn(async move {
            h.sleep(0.01).await;
            order.borrow_mut().push(i);
            if i == 2 {
                h.stop();
            }
        });
    }

    rt.run().unwrap();
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
}

#[test]
fn zero_delay_fires_on_the_next_iteration() {
    init();

    let rt = Runtime::new().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    {
        let h = rt.handle().clone();
        let order = order.clone();
        rt.handle().spawn(async move {
            order.borrow_mut().push("before");
            h.sleep(0.0).await;
            order.borrow_mut().push("after");
            h.stop();
        });
    }

    // The task already ran up to its suspension point.
    assert_eq!(*order.borrow(), vec!["before"]);

    rt.run().unwrap();
    assert_eq!(*order.borrow(), vec!["before", "after"]);
}

#[test]
fn sleep_takes_at_least_the_requested_delay() {
    init();

    let rt = Runtime::new().unwrap();
    let start = Instant::now();

    {
        let h = rt.handle().clone();
        rt.handle().spawn(async move {
            h.sleep(0.05).await;
            h.stop();
        });
    }

    rt.run().unwrap();
    let elapsed = start.elapsed().as_secs_f64();
    assert!(elapsed >= 0.045, "sleep returned after {elapsed}s");
    assert!(elapsed < 0.5, "sleep overslept: {elapsed}s");
}

#[test]
fn explicit_resume_ends_a_sleep_early() {
    init();

    let rt = Runtime::new().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));
    let start = Instant::now();

    let sleeper = {
        let h = rt.handle().clone();
        let order = order.clone();
        rt.handle().spawn(async move {
            h.sleep(10.0).await;
            order.borrow_mut().push("woke");
            h.stop();
        })
    };

    {
        let h = rt.handle().clone();
        rt.handle().spawn(async move {
            h.sleep(0.01).await;
            h.resume(sleeper);
        });
    }

    rt.run().unwrap();
    assert_eq!(*order.borrow(), vec!["woke"]);
    assert!(start.elapsed().as_secs_f64() < 5.0);
}

#[test]
fn count_and_all_track_live_tasks() {
    init();

    let rt = Runtime::new().unwrap();
    let seen = Rc::new(RefCell::new((0, 0)));

    for _ in 0..2 {
        let h = rt.handle().clone();
        rt.handle().spawn(async move {
            h.sleep(0.02).await;
        });
    }

    {
        let h = rt.handle().clone();
        let seen = seen.clone();
        rt.handle().spawn(async move {
            // The two sleepers plus this task.
            *seen.borrow_mut() = (h.count(), h.all().len());
            h.sleep(0.04).await;
            h.stop();
        });
    }

    assert_eq!(rt.handle().count(), 3);
    rt.run().unwrap();
    assert_eq!(*seen.borrow(), (3, 3));
    assert_eq!(rt.handle().count(), 0);
}
