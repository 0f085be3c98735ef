use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window};

/// One frame's worth of input, independent of the windowing system.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputState
{
    pub mouse_delta:   [f32; 2],
    pub forward:       bool,
    pub backward:      bool,
    pub left:          bool,
    pub right:         bool,
    pub up:            bool,
    pub down:          bool,
    pub cursor_locked: bool
}

impl InputState
{
    /// Movement intent in camera-local axes: (right, forward, up).
    pub fn get_movement_axes(&self) -> [f32; 3]
    {
        let axis = |pos: bool, neg: bool| (pos as i32 - neg as i32) as f32;

        [
            axis(self.right, self.left),
            axis(self.forward, self.backward),
            axis(self.up, self.down)
        ]
    }
}

pub struct InputManager
{
    window:          Arc<Window>,
    key_states:      HashMap<PhysicalKey, ElementState>,
    mouse_delta:     (f64, f64),
    cursor_attached: bool,
    previous_frame:  Instant,
    delta_time:      f32
}

impl InputManager
{
    pub fn new(window: Arc<Window>) -> InputManager
    {
        InputManager {
            window,
            key_states: HashMap::new(),
            mouse_delta: (0.0, 0.0),
            cursor_attached: false,
            previous_frame: Instant::now(),
            delta_time: 0.0
        }
    }

    pub fn update_with_event(&mut self, event: &Event<()>)
    {
        match event
        {
            Event::WindowEvent {
                window_id,
                event
            } if *window_id == self.window.id() =>
            {
                match event
                {
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key,
                                state,
                                ..
                            },
                        is_synthetic: false,
                        ..
                    } =>
                    {
                        self.key_states.insert(*physical_key, *state);

                        if *physical_key == PhysicalKey::Code(KeyCode::Escape)
                            && *state == ElementState::Pressed
                        {
                            self.detach_cursor();
                        }
                    }
                    WindowEvent::MouseInput {
                        state: ElementState::Pressed,
                        button: MouseButton::Left,
                        ..
                    } if !self.cursor_attached => self.attach_cursor(),
                    WindowEvent::Focused(false) => self.detach_cursor(),
                    _ => ()
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion {
                    delta
                },
                ..
            } if self.cursor_attached =>
            {
                self.mouse_delta.0 += delta.0;
                self.mouse_delta.1 += delta.1;
            }
            _ => ()
        }
    }

    pub fn attach_cursor(&mut self)
    {
        let grabbed = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));

        match grabbed
        {
            Ok(()) =>
            {
                self.window.set_cursor_visible(false);
                self.cursor_attached = true;
            }
            Err(e) => log::warn!("Failed to grab cursor: {e}")
        }
    }

    pub fn detach_cursor(&mut self)
    {
        if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None)
        {
            log::warn!("Failed to release cursor: {e}");
        }

        self.window.set_cursor_visible(true);
        self.cursor_attached = false;
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool
    {
        matches!(
            self.key_states.get(&PhysicalKey::Code(key)),
            Some(ElementState::Pressed)
        )
    }

    pub fn get_delta_time(&self) -> f32
    {
        self.delta_time
    }

    /// Snapshots this frame's input and resets the accumulated mouse motion.
    pub fn take_frame_state(&mut self) -> InputState
    {
        let now = Instant::now();

        self.delta_time = (now - self.previous_frame).as_secs_f32();
        self.previous_frame = now;

        let (dx, dy) = std::mem::take(&mut self.mouse_delta);

        InputState {
            mouse_delta:   [dx as f32, dy as f32],
            forward:       self.is_key_pressed(KeyCode::KeyW),
            backward:      self.is_key_pressed(KeyCode::KeyS),
            left:          self.is_key_pressed(KeyCode::KeyA),
            right:         self.is_key_pressed(KeyCode::KeyD),
            up:            self.is_key_pressed(KeyCode::Space),
            down:          self.is_key_pressed(KeyCode::ShiftLeft),
            cursor_locked: self.cursor_attached
        }
    }
}
