use crate::game::ClientGame;
use macroquad::prelude::*;
use shared::{Entity, EntityKind};

#[derive(Debug, Clone)]
pub struct HudInfo {
    pub player_name: String,
    pub paused: bool,
    pub time_scale: f64,
    pub entity_count: usize,
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&mut self, game: &ClientGame) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        for entity in game.store().iter() {
            let is_local = entity.name() == game.player_name();
            self.draw_entity(entity, Self::entity_color(entity.kind(), is_local));
        }

        self.draw_hud(&HudInfo {
            player_name: game.player_name().to_string(),
            paused: game.is_paused(),
            time_scale: game.player_time_scale().unwrap_or(1.0),
            entity_count: game.store().len(),
        });
    }

    fn entity_color(kind: EntityKind, is_local: bool) -> Color {
        match kind {
            EntityKind::Player if is_local => GREEN,
            EntityKind::Player => Color::from_rgba(255, 68, 68, 255),
            EntityKind::Platform => Color::from_rgba(0, 170, 255, 255),
            EntityKind::Fixed => Color::from_rgba(68, 68, 68, 255),
            EntityKind::Custom(_) => GRAY,
        }
    }

    fn draw_entity(&mut self, entity: &Entity, color: Color) {
        let rect = entity.rect;
        let (x, y) = (rect.x as f32, rect.y as f32);
        let (w, h) = (rect.width as f32, rect.height as f32);

        draw_rectangle(x, y, w, h, color);
        if entity.kind() != EntityKind::Fixed {
            draw_rectangle_lines(x, y, w, h, 2.0, WHITE);
            draw_text(entity.name(), x, y - 4.0, 14.0, WHITE);
        }
    }

    fn draw_hud(&mut self, hud: &HudInfo) {
        draw_text(&hud.player_name, 10.0, 20.0, 18.0, WHITE);
        draw_text(
            &format!("speed x{:.1}  entities {}", hud.time_scale, hud.entity_count),
            10.0,
            40.0,
            14.0,
            WHITE,
        );

        if hud.paused {
            let text = "PAUSED";
            let size = measure_text(text, None, 40, 1.0);
            draw_text(
                text,
                (screen_width() - size.width) / 2.0,
                screen_height() / 2.0,
                40.0,
                YELLOW,
            );
        }

        draw_text(
            "A/D move  Space jump  Shift dash  P pause  +/- speed  Q quit",
            10.0,
            screen_height() - 10.0,
            14.0,
            GRAY,
        );
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
