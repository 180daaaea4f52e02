// SPDX-License-Identifier: MPL-2.0

//! Background layer surfaces that frames are drawn onto.

use crate::{
    LiveWall,
    frame_buffer::{BYTES_PER_PIXEL, FrameBuffer},
    presenter::{Canvas, DrawError, Stretcher},
};
use sctk::{
    compositor::CompositorState,
    reexports::client::{
        QueueHandle,
        protocol::{wl_output::WlOutput, wl_shm},
    },
    shell::{
        WaylandSurface,
        wlr_layer::{Anchor, KeyboardInteractivity, Layer, LayerShell, LayerSurface},
    },
    shm::{Shm, slot::SlotPool},
};

#[derive(Debug)]
pub struct BackgroundLayer {
    output: WlOutput,
    layer: LayerSurface,
    size: Option<(u32, u32)>,
    pool: Option<SlotPool>,
}

/// One layer surface per output on the background layer.
///
/// Surfaces only exist while shown. Hiding destroys them so the desktop
/// background is visible underneath.
#[derive(Debug)]
pub struct LayerCanvas {
    qh: QueueHandle<LiveWall>,
    compositor: CompositorState,
    layer_shell: LayerShell,
    shm: Shm,
    outputs: Vec<WlOutput>,
    layers: Vec<BackgroundLayer>,
    shown: bool,
}

impl LayerCanvas {
    pub fn new(
        qh: QueueHandle<LiveWall>,
        compositor: CompositorState,
        layer_shell: LayerShell,
        shm: Shm,
    ) -> Self {
        Self {
            qh,
            compositor,
            layer_shell,
            shm,
            outputs: Vec::new(),
            layers: Vec::new(),
            shown: false,
        }
    }

    pub fn shm_mut(&mut self) -> &mut Shm {
        &mut self.shm
    }

    pub fn add_output(&mut self, output: WlOutput) {
        if self.outputs.contains(&output) {
            return;
        }

        if self.shown {
            let layer = self.new_layer(&output);
            self.layers.push(layer);
        }

        self.outputs.push(output);
    }

    pub fn remove_output(&mut self, output: &WlOutput) {
        self.outputs.retain(|o| o != output);
        self.layers.retain(|layer| &layer.output != output);
    }

    /// Records the size the compositor picked for a layer.
    pub fn configure(&mut self, layer: &LayerSurface, (width, height): (u32, u32)) {
        let Some(bg_layer) = self.layers.iter_mut().find(|l| &l.layer == layer) else {
            return;
        };

        tracing::debug!(width, height, "layer configured");
        bg_layer.size = (width > 0 && height > 0).then_some((width, height));

        let len = FrameBuffer::frame_len(width, height);
        if let Some(pool) = bg_layer.pool.as_mut() {
            if let Err(why) = pool.resize(len) {
                tracing::error!(?why, "failed to resize pool");
            }
        }
    }

    pub fn closed(&mut self, layer: &LayerSurface) {
        self.layers.retain(|l| &l.layer != layer);
    }

    /// Creates a layer surface on every known output.
    pub fn show(&mut self) {
        self.shown = true;
        let layers: Vec<_> = self
            .outputs
            .iter()
            .filter(|output| !self.layers.iter().any(|l| &l.output == *output))
            .map(|output| self.new_layer(output))
            .collect();
        self.layers.extend(layers);
    }

    fn new_layer(&self, output: &WlOutput) -> BackgroundLayer {
        let surface = self.compositor.create_surface(&self.qh);

        let layer = self.layer_shell.create_layer_surface(
            &self.qh,
            surface.clone(),
            Layer::Background,
            Some("wallpaper"),
            Some(output),
        );

        layer.set_anchor(Anchor::all());
        layer.set_exclusive_zone(-1);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        surface.commit();

        BackgroundLayer {
            output: output.clone(),
            layer,
            size: None,
            pool: None,
        }
    }
}

impl Canvas for LayerCanvas {
    fn present(
        &mut self,
        frame: &FrameBuffer,
        stretcher: &mut Stretcher,
    ) -> Result<usize, DrawError> {
        if !self.shown {
            self.show();
            // drawn once the compositor configures the new surfaces
            return Ok(0);
        }

        let mut drawn = 0;
        for bg_layer in &mut self.layers {
            let Some((width, height)) = bg_layer.size else {
                continue;
            };

            let stride = width as usize * BYTES_PER_PIXEL;
            let pool = match bg_layer.pool.as_mut() {
                Some(pool) => pool,
                None => bg_layer
                    .pool
                    .insert(SlotPool::new(stride * height as usize, &self.shm)?),
            };

            let (buffer, canvas) = pool.create_buffer(
                width as i32,
                height as i32,
                stride as i32,
                wl_shm::Format::Xrgb8888,
            )?;

            stretcher.stretch(frame, canvas, width, height)?;

            let wl_surface = bg_layer.layer.wl_surface();
            wl_surface.damage_buffer(0, 0, width as i32, height as i32);

            if let Err(why) = buffer.attach_to(wl_surface) {
                tracing::error!(?why, "buffer attachment failed");
                continue;
            }

            wl_surface.commit();
            drawn += 1;
        }

        Ok(drawn)
    }

    fn hide(&mut self) {
        self.shown = false;
        self.layers.clear();
    }
}
