// SPDX-License-Identifier: MPL-2.0-only

mod control;
mod daily;
mod desktop;
mod draw;
mod error;
mod ffmpeg;
mod frame_buffer;
mod mux;
mod presenter;
mod shm_receiver;
mod sources;
#[cfg(test)]
mod testing;

use control::Command;
use daily::CachedDaily;
use desktop::SystemBackground;
use draw::LayerCanvas;
use error::{ErrorKind, SourceError};
use eyre::Context;
use ffmpeg::FfmpegProducer;
use livewall_config::{Config, state::State};
use mux::SourceMultiplexer;
use presenter::Presenter;
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop::{
            self, LoopHandle, RegistrationToken,
            signals::{Signal, Signals},
            timer::{TimeoutAction, Timer},
        },
        calloop_wayland_source::WaylandSource,
        client::{
            Connection, QueueHandle,
            globals::registry_queue_init,
            protocol::{
                wl_output::{self, WlOutput},
                wl_surface,
            },
        },
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::wlr_layer::{LayerShell, LayerShellHandler, LayerSurface, LayerSurfaceConfigure},
    shm::{Shm, ShmHandler},
};
use shm_receiver::ShmReceiver;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(why) => {
            tracing::warn!(%why, "config file error, falling back to defaults");
            Config::default()
        }
    };

    let state = match State::load() {
        Ok(state) => state,
        Err(why) => {
            tracing::warn!(%why, "state file error, falling back to defaults");
            State::default()
        }
    };

    let Some(_lock) = control::lock_instance(&livewall_config::runtime_dir())
        .wrap_err("failed to take the instance lock")?
    else {
        tracing::info!("another instance is running");
        return Ok(());
    };

    let conn = Connection::connect_to_env().wrap_err("wayland client connection failed")?;

    let mut event_loop: calloop::EventLoop<'static, LiveWall> =
        calloop::EventLoop::try_new().wrap_err("failed to create event loop")?;

    let (globals, event_queue) =
        registry_queue_init(&conn).wrap_err("failed to initialize registry queue")?;

    let qh = event_queue.handle();

    WaylandSource::new(conn, event_queue)
        .insert(event_loop.handle())
        .map_err(|err| err.error)
        .wrap_err("failed to insert main EventLoop into WaylandSource")?;

    let canvas = LayerCanvas::new(
        qh.clone(),
        CompositorState::bind(&globals, &qh).wrap_err("wl_compositor is not available")?,
        LayerShell::bind(&globals, &qh).wrap_err("layer shell is not available")?,
        Shm::bind(&globals, &qh).wrap_err("wl_shm is not available")?,
    );

    let sender_dir = config.sender_directory();
    tracing::debug!(dir = %sender_dir.display(), "watching for senders");

    let mux = SourceMultiplexer::new(
        ShmReceiver::new(sender_dir),
        FfmpegProducer::new(config.ffmpeg.clone(), config.ffprobe.clone()),
        SystemBackground,
        config.sender.clone(),
    );

    let daily_dir = CachedDaily::default_dir()
        .unwrap_or_else(|| livewall_config::runtime_dir().join("daily"));

    let mut livewall = LiveWall {
        registry_state: RegistryState::new(&globals),
        output_state: OutputState::new(&globals, &qh),
        presenter: Presenter::new(canvas, config.frame_rate),
        mux,
        daily: CachedDaily::new(daily_dir),
        config,
        state,
        loop_handle: event_loop.handle(),
        tick_token: None,
        exit: false,
    };

    control::stdin_source(&livewall.loop_handle)?;

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])
        .wrap_err("failed to install signal handlers")?;
    livewall
        .loop_handle
        .insert_source(signals, |event, _, state| {
            tracing::info!(signal = ?event.signal(), "shutting down");
            state.shutdown(state.config.keep_on_exit);
        })
        .map_err(|err| eyre::eyre!("failed to insert signal source: {err}"))?;

    if let Some(arg) = std::env::args().nth(1) {
        match control::resolve_video(&arg) {
            Some(path) => livewall.handle(Command::Video(path)),
            None => tracing::warn!(video = %arg, "video not found"),
        }
    }

    livewall.schedule_tick();

    while !livewall.exit {
        event_loop.dispatch(None, &mut livewall)?;
    }

    Ok(())
}

pub struct LiveWall {
    registry_state: RegistryState,
    output_state: OutputState,
    mux: SourceMultiplexer<ShmReceiver, FfmpegProducer, SystemBackground>,
    presenter: Presenter<LayerCanvas>,
    daily: CachedDaily,
    config: Config,
    state: State,
    loop_handle: LoopHandle<'static, LiveWall>,
    tick_token: Option<RegistrationToken>,
    exit: bool,
}

impl LiveWall {
    /// Restarts the tick timer so a new selection is serviced right away.
    fn schedule_tick(&mut self) {
        if let Some(token) = self.tick_token.take() {
            self.loop_handle.remove(token);
        }

        let token = self.loop_handle.insert_source(Timer::immediate(), |_, _, state| {
            let outcome = state.mux.tick(&mut state.presenter);
            tracing::trace!(?outcome, "tick");
            TimeoutAction::ToDuration(state.mux.tick_period())
        });

        match token {
            Ok(token) => self.tick_token = Some(token),
            Err(why) => tracing::error!(%why, "failed to schedule tick"),
        }
    }

    pub fn handle(&mut self, command: Command) {
        let span = tracing::debug_span!("LiveWall::handle", ?command);
        let _handle = span.enter();

        let selected = match command {
            Command::Senders => {
                let senders = self.mux.texture().receiver().list_senders();
                if senders.is_empty() {
                    tracing::info!("no senders");
                }
                for sender in senders {
                    tracing::info!(
                        name = %sender.name,
                        width = sender.width,
                        height = sender.height,
                        frame = sender.frame,
                        "sender"
                    );
                }
                Ok(false)
            }
            Command::Sender(name) => self
                .mux
                .select_shared_texture(name.as_deref())
                .map(|()| true),
            Command::Video(path) => self.mux.select_video(&path).map(|()| true),
            Command::Image(path) => self.mux.select_image(&path).map(|()| true),
            Command::Daily {
                path: Some(path),
                description,
            } => self.mux.select_daily(&path, &description).map(|()| true),
            Command::Daily { path: None, .. } => {
                self.mux.request_daily(&mut self.daily).map(|()| true)
            }
            Command::Slideshow {
                folder,
                interval,
                random,
            } => self.select_slideshow(folder, interval, random),
            Command::About => {
                tracing::info!(showing = %self.mux.describe(), "about");
                Ok(false)
            }
            Command::Quit(keep) => {
                self.shutdown(keep.unwrap_or(self.config.keep_on_exit));
                Ok(false)
            }
        };

        match selected {
            Ok(true) => self.schedule_tick(),
            Ok(false) => (),
            Err(why) => match why.kind() {
                ErrorKind::SourceUnavailable => tracing::warn!(%why, "source unavailable"),
                ErrorKind::StreamDecodeFailure => tracing::error!(%why, "cannot decode video"),
                ErrorKind::DownloadFailure => tracing::warn!(%why, "no daily image"),
            },
        }
    }

    /// Starts a slideshow, filling in missing settings from the saved state,
    /// and saves the settings used.
    fn select_slideshow(
        &mut self,
        folder: Option<PathBuf>,
        interval: Option<u64>,
        random: Option<bool>,
    ) -> Result<bool, SourceError> {
        let Some(folder) = folder
            .or_else(|| self.state.slideshow_folder.clone())
            .or_else(dirs::picture_dir)
        else {
            tracing::warn!("no slideshow folder");
            return Ok(false);
        };

        let interval = interval.unwrap_or(self.state.slideshow_interval);
        let random = random.unwrap_or(self.state.slideshow_random);

        let files = sources::image_files(&folder)?
            .iter()
            .filter_map(|path| path.file_name().map(PathBuf::from))
            .collect();

        self.mux.select_slideshow(&folder, files, interval, random)?;

        self.state.slideshow_folder = Some(folder);
        self.state.slideshow_interval = interval;
        self.state.slideshow_random = random;
        if let Err(why) = self.state.save() {
            tracing::error!(%why, "failed to save slideshow settings");
        }

        Ok(true)
    }

    fn shutdown(&mut self, keep_current_wallpaper: bool) {
        if let Some(token) = self.tick_token.take() {
            self.loop_handle.remove(token);
        }

        let showing = self.mux.describe();
        self.presenter.hide();
        match self.mux.shutdown(keep_current_wallpaper) {
            Some(path) => tracing::info!(
                path = %path.display(),
                showing = %showing,
                "exiting, wallpaper kept"
            ),
            None => tracing::info!("exiting, original wallpaper restored"),
        }

        self.exit = true;
    }
}

impl CompositorHandler for LiveWall {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: &WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _: &Connection,
        _: &QueueHandle<Self>,
        _: &wl_surface::WlSurface,
        _: &WlOutput,
    ) {
    }
}

impl OutputHandler for LiveWall {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, output: WlOutput) {
        if let Some(info) = self.output_state.info(&output) {
            tracing::debug!(name = ?info.name, "new output");
        }
        self.presenter.canvas_mut().add_output(output);
    }

    fn update_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: WlOutput) {}

    fn output_destroyed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, output: WlOutput) {
        self.presenter.canvas_mut().remove_output(&output);
    }
}

impl LayerShellHandler for LiveWall {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        self.presenter.canvas_mut().closed(layer);
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        self.presenter.canvas_mut().configure(layer, configure.new_size);
    }
}

impl ShmHandler for LiveWall {
    fn shm_state(&mut self) -> &mut Shm {
        self.presenter.canvas_mut().shm_mut()
    }
}

delegate_compositor!(LiveWall);
delegate_output!(LiveWall);
delegate_shm!(LiveWall);
delegate_layer!(LiveWall);
delegate_registry!(LiveWall);

impl ProvidesRegistryState for LiveWall {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState];
}
