use std::cell::RefCell;
use std::rc::Rc;

pub const DEFAULT_CANVAS_WIDTH: u32 = 800;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Abstract drawing target owned by the host. The core only ever clears it
/// and posts short status messages; everything else belongs to state routines.
pub trait RenderSurface {
    fn size(&self) -> (u32, u32);

    fn clear(&mut self);

    fn draw_message(&mut self, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Clear,
    Message(String),
}

/// Surface that records every call; used to drive the scheduler without a
/// window. Clones share one log, so a test can keep a handle after boxing one.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Rc<RefCell<Vec<SurfaceOp>>>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    }
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.borrow().clone()
    }

    pub fn clear_count(&self) -> usize {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Clear))
            .count()
    }

    pub fn last_message(&self) -> Option<String> {
        self.ops.borrow().iter().rev().find_map(|op| match op {
            SurfaceOp::Message(message) => Some(message.clone()),
            SurfaceOp::Clear => None,
        })
    }

    pub fn take_ops(&self) -> Vec<SurfaceOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }
}

impl RenderSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.ops.borrow_mut().push(SurfaceOp::Clear);
    }

    fn draw_message(&mut self, message: &str) {
        self.ops
            .borrow_mut()
            .push(SurfaceOp::Message(message.to_string()));
    }
}
