//! Resource lifecycle and binding cache integration tests.
//!
//! # Test Categories
//!
//! - **Lifecycle Tests**: alloc/free ordering, idempotent re-allocation and
//!   the allocation registry
//! - **Binding Cache Tests**: redundant bind suppression and invalidation on
//!   free, including driver name reuse
//! - **Framebuffer Tests**: attachment validation
//!
//! ```bash
//! cargo test --test lifecycle_tests
//! ```

mod common;

use std::rc::Rc;

use rstest::rstest;

use common::TestContext;
use tessera_graphics::{
    Attachment, Buffer, BufferTarget, Framebuffer, GpuResource, GraphicsError, ResourceState,
    Texture, TextureDescriptor, TextureDimension, TextureFormat, UsageHint,
};

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[rstest]
#[case::vertex(BufferTarget::Array)]
#[case::index(BufferTarget::ElementArray)]
#[case::uniform(BufferTarget::Uniform)]
fn test_alloc_twice_matches_free_then_alloc(#[case] target: BufferTarget) {
    let twice = TestContext::new();
    let mut a = Buffer::with_data(&twice.ctx, target, vec![7; 64]);
    a.alloc().unwrap();
    a.alloc().unwrap();

    let once = TestContext::new();
    let mut b = Buffer::with_data(&once.ctx, target, vec![7; 64]);
    b.alloc().unwrap();
    b.free();
    b.alloc().unwrap();

    assert_eq!(a.state(), b.state());
    assert_eq!(twice.driver.live_objects(), once.driver.live_objects());
    assert_eq!(twice.driver.live_objects(), 1);
    assert_eq!(twice.ctx.registry().live_count(), 1);
    assert_eq!(a.raw().unwrap(), b.raw().unwrap());
}

#[test]
fn test_operations_before_alloc_fail() {
    let t = TestContext::new();
    let mut buffer = Buffer::with_data(&t.ctx, BufferTarget::Array, vec![0; 16]);
    assert_eq!(buffer.state(), ResourceState::Unallocated);
    assert!(matches!(buffer.upload(None), Err(GraphicsError::Configuration(_))));
    assert!(matches!(buffer.handle(), Err(GraphicsError::Configuration(_))));

    buffer.alloc().unwrap();
    buffer.free();
    assert_eq!(buffer.state(), ResourceState::Freed);
    assert!(matches!(buffer.upload(None), Err(GraphicsError::Configuration(_))));
}

#[test]
fn test_immutable_hint_after_alloc() {
    let t = TestContext::new();
    let mut buffer = Buffer::with_data(&t.ctx, BufferTarget::Array, vec![0; 16]);
    buffer.set_usage(UsageHint::Stream).unwrap();
    buffer.alloc().unwrap();
    assert!(matches!(
        buffer.set_usage(UsageHint::Static),
        Err(GraphicsError::Configuration(_))
    ));
    assert_eq!(buffer.usage(), UsageHint::Stream);
}

#[test]
fn test_registry_reports_live_allocations() {
    let t = TestContext::new();
    let mut kept = Buffer::with_data(&t.ctx, BufferTarget::Array, vec![0; 8]).with_label("kept");
    kept.alloc().unwrap();
    {
        let mut dropped = Buffer::with_data(&t.ctx, BufferTarget::Array, vec![0; 8]);
        dropped.alloc().unwrap();
        assert_eq!(t.ctx.registry().live_count(), 2);
    }

    let live = t.ctx.registry().live();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].label.as_deref(), Some("kept"));
    assert_eq!(t.ctx.report_leaks(), 1);
}

// ============================================================================
// Binding Cache Tests
// ============================================================================

#[rstest]
#[case::unit_0(0)]
#[case::unit_5(5)]
fn test_repeated_texture_bind_issues_one_call(#[case] unit: u32) {
    let t = TestContext::new();
    let texture = t.texture(TextureDimension::D2, "albedo");
    let handle = texture.handle().unwrap();
    t.ctx.bind_texture(unit, TextureDimension::D2, handle).unwrap();

    let before = t.driver.stats().texture_binds;
    for _ in 0..4 {
        assert!(!t.ctx.bind_texture(unit, TextureDimension::D2, handle).unwrap());
    }
    assert_eq!(t.driver.stats().texture_binds, before);
}

#[test]
fn test_free_invalidates_cache_across_name_reuse() {
    let t = TestContext::new();
    let mut first = t.texture(TextureDimension::D2, "first");
    let raw = first.raw().unwrap();
    let old = Rc::clone(first.handle().unwrap());
    assert!(t.ctx.texture_unit_cache().is_attached(0, &old));

    first.free();
    assert!(!t.ctx.texture_unit_cache().is_attached(0, &old));
    assert!(t.ctx.texture_unit_cache().current(0).is_none());

    // The driver hands the freed name to the next texture.
    let second = t.texture(TextureDimension::D2, "second");
    assert_eq!(second.raw().unwrap(), raw);
    assert!(!t.ctx.texture_unit_cache().is_attached(0, &old));
    assert!(t
        .ctx
        .texture_unit_cache()
        .is_attached(0, second.handle().unwrap()));
}

#[test]
fn test_uniform_buffer_bind_is_cached() {
    let t = TestContext::new();
    let mut buffer = Buffer::with_data(&t.ctx, BufferTarget::Uniform, vec![0; 64]);
    buffer.alloc().unwrap();
    let handle = buffer.handle().unwrap();

    assert!(t.ctx.bind_uniform_buffer(3, handle).unwrap());
    assert!(!t.ctx.bind_uniform_buffer(3, handle).unwrap());
    assert_eq!(t.driver.stats().uniform_buffer_binds, 1);
    assert_eq!(t.driver.uniform_buffer_binding(3), buffer.raw().ok());

    let slots = t.ctx.uniform_block_cache().len() as u32;
    assert!(matches!(
        t.ctx.bind_uniform_buffer(slots, handle),
        Err(GraphicsError::Capacity(_))
    ));
}

#[test]
fn test_invalidate_bindings_forces_rebind() {
    let t = TestContext::new();
    let texture = t.texture(TextureDimension::D2, "albedo");
    let handle = texture.handle().unwrap();
    t.ctx.invalidate_bindings();
    assert!(t.ctx.bind_texture(0, TextureDimension::D2, handle).unwrap());
}

#[test]
fn test_solid_color_textures_are_shared() {
    let t = TestContext::new();
    let white = t.ctx.solid_color_texture([255; 4]).unwrap();
    let again = t.ctx.solid_color_texture([255; 4]).unwrap();
    assert!(Rc::ptr_eq(&white, &again));
    assert_eq!(white.descriptor().label.as_deref(), Some("solid #ffffffff"));

    let red = t.ctx.solid_color_texture([255, 0, 0, 255]).unwrap();
    assert!(!Rc::ptr_eq(&white, &red));
    assert_eq!(
        t.driver.texture_pixels(red.raw().unwrap()),
        Some(vec![255, 0, 0, 255])
    );

    drop((white, again));
    let before = t.driver.live_objects();
    let fresh = t.ctx.solid_color_texture([255; 4]).unwrap();
    assert_eq!(t.driver.live_objects(), before + 1);
    assert!(fresh.is_allocated());
}

// ============================================================================
// Framebuffer Tests
// ============================================================================

fn render_target(t: &TestContext, format: TextureFormat) -> Texture {
    let mut texture = Texture::new(&t.ctx, TextureDescriptor::new_2d(64, 64, format));
    texture.alloc().unwrap();
    texture
}

#[test]
fn test_framebuffer_attachments() {
    let t = TestContext::new();
    let color = render_target(&t, TextureFormat::Rgba8Unorm);
    let depth = render_target(&t, TextureFormat::Depth24PlusStencil8);

    let mut framebuffer = Framebuffer::new(&t.ctx).with_label("gbuffer");
    framebuffer.attach_color(0, &color).unwrap();
    framebuffer.attach_depth(&depth).unwrap();
    framebuffer.alloc().unwrap();

    let raw = framebuffer.raw().unwrap();
    assert_eq!(
        t.driver.framebuffer_attachment(raw, Attachment::Color(0)),
        color.raw().ok()
    );
    assert_eq!(
        t.driver.framebuffer_attachment(raw, Attachment::DepthStencil),
        depth.raw().ok()
    );
    assert_eq!(t.driver.framebuffer_draw_buffers(raw), vec![Some(0)]);
}

#[rstest]
#[case::double_attach(0, false)]
#[case::beyond_limit(8, true)]
fn test_framebuffer_attach_errors(#[case] index: u32, #[case] capacity: bool) {
    let t = TestContext::new();
    let color = render_target(&t, TextureFormat::Rgba8Unorm);
    let other = render_target(&t, TextureFormat::Rgba8Unorm);

    let mut framebuffer = Framebuffer::new(&t.ctx);
    framebuffer.attach_color(0, &color).unwrap();
    let err = framebuffer.attach_color(index, &other).unwrap_err();
    if capacity {
        assert!(matches!(err, GraphicsError::Capacity(_)));
    } else {
        assert!(matches!(err, GraphicsError::Configuration(_)));
    }
}

#[test]
fn test_framebuffer_is_immutable_once_allocated() {
    let t = TestContext::new();
    let color = render_target(&t, TextureFormat::Rgba8Unorm);
    let extra = render_target(&t, TextureFormat::Rgba8Unorm);

    let mut framebuffer = Framebuffer::new(&t.ctx);
    framebuffer.attach_color(0, &color).unwrap();
    framebuffer.alloc().unwrap();
    assert!(matches!(
        framebuffer.attach_color(1, &extra),
        Err(GraphicsError::Configuration(_))
    ));
}

#[test]
fn test_default_framebuffer_always_binds() {
    let t = TestContext::new();
    let color = render_target(&t, TextureFormat::Rgba8Unorm);
    let mut framebuffer = Framebuffer::new(&t.ctx);
    framebuffer.attach_color(0, &color).unwrap();
    framebuffer.alloc().unwrap();

    assert!(!framebuffer.bind().unwrap());
    assert!(framebuffer.unbind().unwrap());
    assert!(framebuffer.unbind().unwrap());
    assert_eq!(t.driver.current_framebuffer(), None);
}
