//! The per-frame acquire / submit / present sequence.
//!
//! The sequence is expressed over a small trait so its ordering and
//! short-circuiting can be exercised without a GPU.

use triangle_rhi::RhiResult;

/// The three steps of a single-buffered frame, in order.
pub trait FrameBackend {
    /// Acquire the next swapchain image and arrange for the image-available
    /// semaphore to be signalled when it is ready.
    fn acquire_image(&mut self) -> RhiResult<u32>;

    /// Submit the recorded draw for `image_index`, waiting on the
    /// image-available semaphore and signalling render-finished.
    fn submit_draw(&mut self, image_index: u32) -> RhiResult<()>;

    /// Present `image_index`, waiting on the render-finished semaphore.
    fn present_image(&mut self, image_index: u32) -> RhiResult<()>;
}

/// Run one frame: acquire, submit, present.
///
/// Each step only runs if the previous one succeeded; the image index from
/// acquisition flows into both later steps.
pub fn drive_frame<B: FrameBackend>(backend: &mut B) -> RhiResult<()> {
    let image_index = backend.acquire_image()?;
    backend.submit_draw(image_index)?;
    backend.present_image(image_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triangle_rhi::{RhiError, vk};

    #[derive(Debug, PartialEq)]
    enum Step {
        Acquire,
        Submit(u32),
        Present(u32),
    }

    struct RecordingBackend {
        next_image: u32,
        image_count: u32,
        fail_submit: bool,
        log: Vec<Step>,
    }

    impl RecordingBackend {
        fn new(image_count: u32) -> Self {
            Self {
                next_image: 0,
                image_count,
                fail_submit: false,
                log: Vec::new(),
            }
        }
    }

    impl FrameBackend for RecordingBackend {
        fn acquire_image(&mut self) -> RhiResult<u32> {
            self.log.push(Step::Acquire);
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(index)
        }

        fn submit_draw(&mut self, image_index: u32) -> RhiResult<()> {
            self.log.push(Step::Submit(image_index));
            if self.fail_submit {
                return Err(RhiError::Vulkan(vk::Result::ERROR_DEVICE_LOST));
            }
            Ok(())
        }

        fn present_image(&mut self, image_index: u32) -> RhiResult<()> {
            self.log.push(Step::Present(image_index));
            Ok(())
        }
    }

    #[test]
    fn three_frames_run_in_order_and_cycle_images() {
        let mut backend = RecordingBackend::new(3);
        for _ in 0..3 {
            drive_frame(&mut backend).unwrap();
        }
        assert_eq!(
            backend.log,
            vec![
                Step::Acquire,
                Step::Submit(0),
                Step::Present(0),
                Step::Acquire,
                Step::Submit(1),
                Step::Present(1),
                Step::Acquire,
                Step::Submit(2),
                Step::Present(2),
            ]
        );
    }

    #[test]
    fn failed_submit_skips_presentation() {
        let mut backend = RecordingBackend::new(2);
        backend.fail_submit = true;

        let result = drive_frame(&mut backend);
        assert!(result.is_err());
        assert_eq!(backend.log, vec![Step::Acquire, Step::Submit(0)]);
    }
}
