use fnv::FnvHashMap;
use fogbound_core::clock::{Scheduler, Task, TimerId};
use instant::Instant;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

/// `setTimeout` / `requestAnimationFrame` behind the core's scheduler trait.
pub struct WebScheduler {
    window: web::Window,
    origin: Instant,
    next_id: Cell<u64>,
    /// Our timer id -> browser timeout handle, for timers not yet fired.
    pending: Rc<RefCell<FnvHashMap<u64, i32>>>,
}

impl WebScheduler {
    pub fn new(window: web::Window) -> Self {
        Self {
            window,
            origin: Instant::now(),
            next_id: Cell::new(0),
            pending: Rc::new(RefCell::new(FnvHashMap::default())),
        }
    }
}

impl Scheduler for WebScheduler {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn after(&self, delay_ms: u32, task: Task) -> TimerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let pending = self.pending.clone();
        let callback = Closure::once_into_js(move || {
            pending.borrow_mut().remove(&id);
            task();
        });
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                delay_ms.min(i32::MAX as u32) as i32,
            ) {
            Ok(handle) => {
                self.pending.borrow_mut().insert(id, handle);
            }
            Err(e) => log::error!("[scheduler] setTimeout failed: {:?}", e),
        }
        TimerId::from_raw(id)
    }

    fn next_frame(&self, task: Task) {
        let callback = Closure::once_into_js(move || task());
        if let Err(e) = self
            .window
            .request_animation_frame(callback.unchecked_ref())
        {
            log::error!("[scheduler] requestAnimationFrame failed: {:?}", e);
        }
    }

    fn cancel(&self, id: TimerId) {
        let handle = self.pending.borrow_mut().remove(&id.raw());
        if let Some(handle) = handle {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}
