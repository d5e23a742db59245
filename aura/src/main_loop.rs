use std::sync::Arc;

use aura_core::cli::EngineArgs;
use aura_core::log;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::Engine;

pub struct EngineLoop {
    engine: Option<Engine>,
    args: EngineArgs,
    error: Option<anyhow::Error>,

    frame_count: u64,
    last_time_printed: std::time::Instant,
}

impl ApplicationHandler for EngineLoop {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Aura")
            .with_min_inner_size(LogicalSize::new(32, 32))
            .with_inner_size(LogicalSize::new(self.args.width, self.args.height));

        let engine = event_loop
            .create_window(window_attributes)
            .map_err(anyhow::Error::from)
            .and_then(|window| Engine::new(Arc::new(window), &self.args));

        match engine {
            Ok(engine) => {
                engine.main_window.request_redraw();
                self.engine = Some(engine);
            }
            Err(e) => {
                log::error!("Failed to start engine: {:#}", e);
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    #[profiling::function]
    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if engine.should_exit() {
            event_loop.exit();
            return;
        }

        self.process_window_event(&event);
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut engine) = self.engine.take() {
            engine.shutdown();
        }
    }
}

impl EngineLoop {
    pub(super) fn new(args: EngineArgs) -> Result<Self, anyhow::Error> {
        Ok(Self {
            engine: None,
            args,
            error: None,

            frame_count: 0u64,
            last_time_printed: std::time::Instant::now(),
        })
    }

    pub fn run(mut self) -> Result<(), anyhow::Error> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    #[profiling::function("main_loop")]
    fn process_window_event(&mut self, event: &WindowEvent) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        match event {
            WindowEvent::Resized(size) => {
                engine.resize(size.width, size.height);
            }
            WindowEvent::CloseRequested => {
                engine.request_exit();
            }
            WindowEvent::RedrawRequested => {
                engine.render();
                engine.main_window.request_redraw();

                self.frame_count += 1;
                self.report_frame_rate();

                profiling::finish_frame!();
            }
            _ => {}
        }
    }

    fn report_frame_rate(&mut self) {
        let now = std::time::Instant::now();
        let elapsed = (now - self.last_time_printed).as_secs_f32();
        if elapsed > 1. {
            log::info!("Frame rate: {} fps", self.frame_count as f32 / elapsed);
            self.last_time_printed = now;
            self.frame_count = 0;
        }
    }
}
