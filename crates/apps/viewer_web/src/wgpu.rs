#[cfg(target_arch = "wasm32")]
mod imp {
    use ::wgpu::util::DeviceExt;
    use std::borrow::Cow;
    use std::collections::BTreeMap;
    use wasm_bindgen::JsCast;

    use foundation::{HandleAllocator, ResourceHandle, ResourceKind};
    use gpu::{GpuBackend, GpuError, RenderCommand, RenderFrame, SurfaceSize, check_texture_dimensions};
    use scene::{SphereMesh, SphereVertex};

    const PANORAMA_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var panorama: texture_2d<f32>;
@group(1) @binding(1)
var panorama_sampler: sampler;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VsOut {
    return VsOut(globals.view_proj * vec4<f32>(position, 1.0), uv);
}

@fragment
fn fs_main(fs_in: VsOut) -> @location(0) vec4<f32> {
    // Unlit: the image is the colour.
    return textureSample(panorama, panorama_sampler, fs_in.uv);
}
"#;

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Globals {
        view_proj: [[f32; 4]; 4],
    }

    struct GpuGeometry {
        vertex_buffer: ::wgpu::Buffer,
        index_buffer: ::wgpu::Buffer,
    }

    thread_local! {
        // `wgpu::Surface<'static>` must not outlive its instance, so the
        // instance lives for the whole page and is shared by every viewer.
        static INSTANCE: &'static ::wgpu::Instance = Box::leak(Box::new(::wgpu::Instance::new(
            &::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::BROWSER_WEBGPU | ::wgpu::Backends::GL,
                ..Default::default()
            },
        )));
    }

    fn shared_instance() -> &'static ::wgpu::Instance {
        INSTANCE.with(|instance| *instance)
    }

    /// WebGPU/WebGL2 context drawing into a canvas it owns.
    pub struct WgpuBackend {
        context: ResourceHandle,
        allocator: HandleAllocator,
        canvas: web_sys::HtmlCanvasElement,
        surface: Option<::wgpu::Surface<'static>>,
        device: ::wgpu::Device,
        queue: ::wgpu::Queue,
        config: ::wgpu::SurfaceConfiguration,
        pipeline: ::wgpu::RenderPipeline,
        globals_buffer: ::wgpu::Buffer,
        globals_bind_group: ::wgpu::BindGroup,
        material_layout: ::wgpu::BindGroupLayout,
        sampler: ::wgpu::Sampler,
        geometries: BTreeMap<ResourceHandle, GpuGeometry>,
        textures: BTreeMap<ResourceHandle, ::wgpu::Texture>,
        materials: BTreeMap<ResourceHandle, ::wgpu::BindGroup>,
    }

    impl std::fmt::Debug for WgpuBackend {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WgpuBackend")
                .field("context", &self.context)
                .field("size", &(self.config.width, self.config.height))
                .field("format", &self.config.format)
                .field("geometries", &self.geometries.len())
                .field("textures", &self.textures.len())
                .field("materials", &self.materials.len())
                .finish()
        }
    }

    fn unavailable(what: &str, err: impl std::fmt::Display) -> GpuError {
        GpuError::ContextUnavailable(format!("{what}: {err}"))
    }

    fn js_unavailable(what: &str, err: wasm_bindgen::JsValue) -> GpuError {
        GpuError::ContextUnavailable(format!("{what}: {err:?}"))
    }

    impl WgpuBackend {
        /// Creates a canvas inside `container` and a context drawing to it.
        /// The canvas is removed again if acquisition fails.
        pub async fn acquire(container: &web_sys::HtmlElement, size: SurfaceSize) -> Result<Self, GpuError> {
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| GpuError::ContextUnavailable("document missing".to_string()))?;
            let canvas = document
                .create_element("canvas")
                .map_err(|e| js_unavailable("canvas", e))?
                .dyn_into::<web_sys::HtmlCanvasElement>()
                .map_err(|_| GpuError::ContextUnavailable("canvas element has the wrong type".to_string()))?;
            canvas.set_width(size.width.max(1));
            canvas.set_height(size.height.max(1));
            let style = canvas.style();
            for (name, value) in [("display", "block"), ("width", "100%"), ("height", "100%")] {
                style
                    .set_property(name, value)
                    .map_err(|e| js_unavailable("canvas style", e))?;
            }
            container
                .append_child(&canvas)
                .map_err(|e| js_unavailable("canvas mount", e))?;

            match Self::init(canvas.clone(), size).await {
                Ok(backend) => Ok(backend),
                Err(err) => {
                    canvas.remove();
                    Err(err)
                }
            }
        }

        async fn init(canvas: web_sys::HtmlCanvasElement, size: SurfaceSize) -> Result<Self, GpuError> {
            let instance = shared_instance();
            let surface = instance
                .create_surface(::wgpu::SurfaceTarget::Canvas(canvas.clone()))
                .map_err(|e| unavailable("surface error", e))?;
            let adapter = instance
                .request_adapter(&::wgpu::RequestAdapterOptions {
                    power_preference: ::wgpu::PowerPreference::HighPerformance,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|e| unavailable("adapter error", e))?;
            let (device, queue) = adapter
                .request_device(&::wgpu::DeviceDescriptor {
                    label: Some("panorama-device"),
                    required_features: ::wgpu::Features::empty(),
                    // Ask for the adapter's real texture limits so large
                    // panoramas fit where the hardware allows.
                    required_limits: ::wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                    ..Default::default()
                })
                .await
                .map_err(|e| unavailable("device error", e))?;

            let surface_caps = surface.get_capabilities(&adapter);
            let format = surface_caps
                .formats
                .iter()
                .copied()
                .find(|f| f.is_srgb())
                .or_else(|| surface_caps.formats.first().copied())
                .ok_or_else(|| GpuError::ContextUnavailable("surface reports no formats".to_string()))?;
            let alpha_mode = surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(::wgpu::CompositeAlphaMode::Auto);
            let config = ::wgpu::SurfaceConfiguration {
                usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: size.width.max(1),
                height: size.height.max(1),
                desired_maximum_frame_latency: 2,
                present_mode: ::wgpu::PresentMode::Fifo,
                alpha_mode,
                view_formats: vec![],
            };
            surface.configure(&device, &config);

            let shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
                label: Some("panorama-shader"),
                source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(PANORAMA_SHADER)),
            });

            let globals_buffer = device.create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("panorama-globals"),
                contents: bytemuck::bytes_of(&Globals {
                    view_proj: foundation::math::MAT4_IDENTITY,
                }),
                usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
            });
            let globals_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
                label: Some("panorama-globals-bgl"),
                entries: &[::wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ::wgpu::ShaderStages::VERTEX,
                    ty: ::wgpu::BindingType::Buffer {
                        ty: ::wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let globals_bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
                label: Some("panorama-globals-bg"),
                layout: &globals_layout,
                entries: &[::wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                }],
            });

            let material_layout = device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
                label: Some("panorama-material-bgl"),
                entries: &[
                    ::wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ::wgpu::ShaderStages::FRAGMENT,
                        ty: ::wgpu::BindingType::Texture {
                            sample_type: ::wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: ::wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    ::wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ::wgpu::ShaderStages::FRAGMENT,
                        ty: ::wgpu::BindingType::Sampler(::wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
            let sampler = device.create_sampler(&::wgpu::SamplerDescriptor {
                label: Some("panorama-sampler"),
                address_mode_u: ::wgpu::AddressMode::ClampToEdge,
                address_mode_v: ::wgpu::AddressMode::ClampToEdge,
                mag_filter: ::wgpu::FilterMode::Linear,
                min_filter: ::wgpu::FilterMode::Linear,
                ..Default::default()
            });

            let pipeline_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
                label: Some("panorama-pipeline-layout"),
                bind_group_layouts: &[&globals_layout, &material_layout],
                immediate_size: 0,
            });
            let pipeline = device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
                label: Some("panorama-pipeline"),
                layout: Some(&pipeline_layout),
                vertex: ::wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[::wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<SphereVertex>() as ::wgpu::BufferAddress,
                        step_mode: ::wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            ::wgpu::VertexAttribute {
                                format: ::wgpu::VertexFormat::Float32x3,
                                offset: 0,
                                shader_location: 0,
                            },
                            ::wgpu::VertexAttribute {
                                format: ::wgpu::VertexFormat::Float32x2,
                                offset: 12,
                                shader_location: 1,
                            },
                        ],
                    }],
                },
                fragment: Some(::wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(::wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(::wgpu::BlendState::REPLACE),
                        write_mask: ::wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: ::wgpu::PrimitiveState {
                    topology: ::wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: ::wgpu::FrontFace::Ccw,
                    // The sphere's front faces point at its center.
                    cull_mode: Some(::wgpu::Face::Back),
                    polygon_mode: ::wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: ::wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

            let mut allocator = HandleAllocator::new();
            let context = ResourceHandle {
                kind: ResourceKind::Context,
                handle: allocator.allocate(),
            };
            tracing::info!(
                width = config.width,
                height = config.height,
                format = ?config.format,
                max_texture = device.limits().max_texture_dimension_2d,
                "wgpu context ready"
            );

            Ok(Self {
                context,
                allocator,
                canvas,
                surface: Some(surface),
                device,
                queue,
                config,
                pipeline,
                globals_buffer,
                globals_bind_group,
                material_layout,
                sampler,
                geometries: BTreeMap::new(),
                textures: BTreeMap::new(),
                materials: BTreeMap::new(),
            })
        }

        fn mint(&mut self, kind: ResourceKind) -> ResourceHandle {
            ResourceHandle {
                kind,
                handle: self.allocator.allocate(),
            }
        }

        fn ensure_active(&self) -> Result<(), GpuError> {
            if self.surface.is_none() {
                return Err(GpuError::ContextLost);
            }
            Ok(())
        }
    }

    impl GpuBackend for WgpuBackend {
        type Image = web_sys::ImageBitmap;

        fn context(&self) -> ResourceHandle {
            self.context
        }

        fn surface_size(&self) -> SurfaceSize {
            SurfaceSize::new(self.config.width, self.config.height)
        }

        fn max_texture_dimension(&self) -> u32 {
            self.device.limits().max_texture_dimension_2d
        }

        fn resize_surface(&mut self, size: SurfaceSize) {
            let Some(surface) = &self.surface else {
                return;
            };
            self.config.width = size.width.max(1);
            self.config.height = size.height.max(1);
            self.canvas.set_width(self.config.width);
            self.canvas.set_height(self.config.height);
            surface.configure(&self.device, &self.config);
        }

        fn create_geometry(&mut self, mesh: &SphereMesh) -> Result<ResourceHandle, GpuError> {
            self.ensure_active()?;
            let vertex_buffer = self.device.create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("panorama-sphere-vertices"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: ::wgpu::BufferUsages::VERTEX,
            });
            let index_buffer = self.device.create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some("panorama-sphere-indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: ::wgpu::BufferUsages::INDEX,
            });
            let handle = self.mint(ResourceKind::Geometry);
            self.geometries.insert(
                handle,
                GpuGeometry {
                    vertex_buffer,
                    index_buffer,
                },
            );
            Ok(handle)
        }

        fn create_texture(&mut self, image: &web_sys::ImageBitmap) -> Result<ResourceHandle, GpuError> {
            self.ensure_active()?;
            let (width, height) = (image.width(), image.height());
            check_texture_dimensions(width, height, self.max_texture_dimension())?;
            let size = ::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            let texture = self.device.create_texture(&::wgpu::TextureDescriptor {
                label: Some("panorama-texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: ::wgpu::TextureDimension::D2,
                format: ::wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: ::wgpu::TextureUsages::TEXTURE_BINDING
                    | ::wgpu::TextureUsages::COPY_DST
                    | ::wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            self.queue.copy_external_image_to_texture(
                &::wgpu::CopyExternalImageSourceInfo {
                    source: ::wgpu::ExternalImageSource::ImageBitmap(image.clone()),
                    origin: ::wgpu::Origin2d::ZERO,
                    flip_y: false,
                },
                ::wgpu::CopyExternalImageDestInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: ::wgpu::Origin3d::ZERO,
                    aspect: ::wgpu::TextureAspect::All,
                    color_space: ::wgpu::PredefinedColorSpace::Srgb,
                    premultiplied_alpha: false,
                },
                size,
            );
            let handle = self.mint(ResourceKind::Texture);
            self.textures.insert(handle, texture);
            tracing::debug!(%handle, width, height, "panorama texture uploaded");
            Ok(handle)
        }

        fn create_material(&mut self, texture: ResourceHandle) -> Result<ResourceHandle, GpuError> {
            self.ensure_active()?;
            let view = self
                .textures
                .get(&texture)
                .ok_or(GpuError::UnknownResource(texture))?
                .create_view(&::wgpu::TextureViewDescriptor::default());
            let bind_group = self.device.create_bind_group(&::wgpu::BindGroupDescriptor {
                label: Some("panorama-material"),
                layout: &self.material_layout,
                entries: &[
                    ::wgpu::BindGroupEntry {
                        binding: 0,
                        resource: ::wgpu::BindingResource::TextureView(&view),
                    },
                    ::wgpu::BindGroupEntry {
                        binding: 1,
                        resource: ::wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            let handle = self.mint(ResourceKind::Material);
            self.materials.insert(handle, bind_group);
            Ok(handle)
        }

        fn render(&mut self, frame: &RenderFrame) -> Result<(), GpuError> {
            let surface = self.surface.as_ref().ok_or(GpuError::ContextLost)?;
            let output = surface
                .get_current_texture()
                .map_err(|e| GpuError::Render(format!("surface acquire failed: {e}")))?;
            let view = output
                .texture
                .create_view(&::wgpu::TextureViewDescriptor::default());

            self.queue.write_buffer(
                &self.globals_buffer,
                0,
                bytemuck::bytes_of(&Globals {
                    view_proj: frame.view_proj,
                }),
            );

            let [r, g, b, a] = frame.clear_color().unwrap_or([0.0, 0.0, 0.0, 1.0]);
            let mut encoder = self
                .device
                .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                    label: Some("panorama-encoder"),
                });
            {
                let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                    label: Some("panorama-pass"),
                    color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: ::wgpu::Operations {
                            load: ::wgpu::LoadOp::Clear(::wgpu::Color { r, g, b, a }),
                            store: ::wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

                for command in &frame.commands {
                    let RenderCommand::DrawMesh {
                        geometry,
                        material,
                        index_count,
                    } = command
                    else {
                        continue;
                    };
                    let (Some(geometry), Some(material)) =
                        (self.geometries.get(geometry), self.materials.get(material))
                    else {
                        continue;
                    };
                    rpass.set_pipeline(&self.pipeline);
                    rpass.set_bind_group(0, &self.globals_bind_group, &[]);
                    rpass.set_bind_group(1, material, &[]);
                    rpass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                    rpass.set_index_buffer(geometry.index_buffer.slice(..), ::wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(0..*index_count, 0, 0..1);
                }
            }

            self.queue.submit(std::iter::once(encoder.finish()));
            output.present();
            Ok(())
        }

        fn destroy(&mut self, handle: ResourceHandle) {
            let known = match handle.kind {
                ResourceKind::Geometry => self.geometries.remove(&handle).map(|geometry| {
                    geometry.vertex_buffer.destroy();
                    geometry.index_buffer.destroy();
                }),
                ResourceKind::Texture => self.textures.remove(&handle).map(|texture| texture.destroy()),
                ResourceKind::Material => self.materials.remove(&handle).map(drop),
                ResourceKind::Context => {
                    self.release();
                    return;
                }
            };
            if known.is_some() {
                self.allocator.release(handle.handle);
            }
        }

        fn release(&mut self) {
            if self.surface.is_none() {
                return;
            }
            self.materials.clear();
            for (_, texture) in std::mem::take(&mut self.textures) {
                texture.destroy();
            }
            for (_, geometry) in std::mem::take(&mut self.geometries) {
                geometry.vertex_buffer.destroy();
                geometry.index_buffer.destroy();
            }
            self.surface = None;
            self.device.destroy();
            self.canvas.remove();
            self.allocator.release(self.context.handle);
            tracing::debug!("wgpu context released");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use foundation::ResourceHandle;
    use gpu::{GpuBackend, GpuError, RenderFrame, SurfaceSize};
    use scene::SphereMesh;

    /// Never constructed off the web.
    #[derive(Debug)]
    pub enum WgpuBackend {}

    impl WgpuBackend {
        pub async fn acquire(_container: &web_sys::HtmlElement, _size: SurfaceSize) -> Result<Self, GpuError> {
            Err(GpuError::ContextUnavailable(
                "wgpu rendering is only available on wasm32 targets".to_string(),
            ))
        }
    }

    impl GpuBackend for WgpuBackend {
        type Image = web_sys::ImageBitmap;

        fn context(&self) -> ResourceHandle {
            match *self {}
        }

        fn surface_size(&self) -> SurfaceSize {
            match *self {}
        }

        fn max_texture_dimension(&self) -> u32 {
            match *self {}
        }

        fn resize_surface(&mut self, _size: SurfaceSize) {
            match *self {}
        }

        fn create_geometry(&mut self, _mesh: &SphereMesh) -> Result<ResourceHandle, GpuError> {
            match *self {}
        }

        fn create_texture(&mut self, _image: &web_sys::ImageBitmap) -> Result<ResourceHandle, GpuError> {
            match *self {}
        }

        fn create_material(&mut self, _texture: ResourceHandle) -> Result<ResourceHandle, GpuError> {
            match *self {}
        }

        fn render(&mut self, _frame: &RenderFrame) -> Result<(), GpuError> {
            match *self {}
        }

        fn destroy(&mut self, _handle: ResourceHandle) {
            match *self {}
        }

        fn release(&mut self) {
            match *self {}
        }
    }
}

pub use imp::WgpuBackend;
