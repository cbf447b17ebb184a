#![cfg(not(loom))]

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{atomic, Arc},
};

use msqueue::hazard_ptr::Domain;

#[test]
fn protect_boxed() {
    struct Element {
        value: u32,
        dropped: Rc<RefCell<bool>>,
    }
    impl Drop for Element {
        fn drop(&mut self) {
            *self.dropped.borrow_mut() = true;
        }
    }

    let free_element = |ptr: *mut Element| {
        let boxed = unsafe { Box::from_raw(ptr) };
        drop(boxed);
    };

    let domain = Domain::<Element>::new(1);

    let dropped_initial_element = Rc::new(RefCell::new(false));
    let initial_ptr = Box::into_raw(Box::new(Element {
        value: 0,
        dropped: dropped_initial_element.clone(),
    }));

    let list_head = atomic::AtomicPtr::new(initial_ptr);

    let initial_guard = domain.protect(&list_head);

    let new_ptr = Box::into_raw(Box::new(Element {
        value: 1,
        dropped: Rc::new(RefCell::new(false)),
    }));
    if list_head
        .compare_exchange(
            initial_ptr,
            new_ptr,
            atomic::Ordering::SeqCst,
            atomic::Ordering::SeqCst,
        )
        .is_ok()
    {
        unsafe { domain.retire(initial_ptr, free_element) };
    }

    assert_eq!(0, unsafe { initial_guard.as_ref() }.unwrap().value);
    assert_eq!(false, *dropped_initial_element.borrow());

    let new_guard = domain.protect(&list_head);
    assert_eq!(1, unsafe { new_guard.as_ref() }.unwrap().value);

    drop(initial_guard);
    assert_eq!(1, domain.reclaim(free_element));

    assert_eq!(true, *dropped_initial_element.borrow());

    drop(new_guard);
    free_element(new_ptr);
}

#[test]
fn concurrent_protect_retire() {
    const ROUNDS: u64 = 1000;

    let domain = Arc::new(Domain::<u64>::new(8));
    let shared = Arc::new(atomic::AtomicPtr::new(Box::into_raw(Box::new(0_u64))));
    let freed = Arc::new(atomic::AtomicU64::new(0));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let c_domain = domain.clone();
            let c_shared = shared.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..ROUNDS {
                    let guard = c_domain.protect(&c_shared);
                    let value = *unsafe { guard.as_ref() }.unwrap();
                    // The Writer only ever stores increasing Values
                    assert!(value >= last);
                    last = value;
                }
            })
        })
        .collect();

    let writer = {
        let c_domain = domain.clone();
        let c_shared = shared.clone();
        let c_freed = freed.clone();
        std::thread::spawn(move || {
            for value in 1..=ROUNDS {
                let n_ptr = Box::into_raw(Box::new(value));
                let old = c_shared.swap(n_ptr, atomic::Ordering::SeqCst);
                unsafe {
                    c_domain.retire(old, |ptr| {
                        c_freed.fetch_add(1, atomic::Ordering::SeqCst);
                        drop(Box::from_raw(ptr));
                    })
                };
            }
        })
    };

    for reader in readers {
        reader.join().unwrap();
    }
    writer.join().unwrap();

    let mut domain = Arc::try_unwrap(domain).unwrap();
    domain.drain(|ptr| {
        freed.fetch_add(1, atomic::Ordering::SeqCst);
        drop(unsafe { Box::from_raw(ptr) });
    });

    assert_eq!(ROUNDS, freed.load(atomic::Ordering::SeqCst));

    drop(unsafe { Box::from_raw(shared.load(atomic::Ordering::SeqCst)) });
}
