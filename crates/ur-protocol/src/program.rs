//! 机械臂端控制程序
//!
//! 启动时通过命令通道上传的 URScript 程序。程序以固定周期读取控制循环写入的寄存器，
//! 设定点编号连续 `setpoint_timeout` 个周期不变时自行 halt（看门狗）。
//!
//! 寄存器编号全部来自 [`crate::registers`]，与控制循环的写入保持一致。

use crate::registers::{
    REG_ACCELERATION, REG_GAIN, REG_LOOKAHEAD, REG_SETPOINT, REG_TARGET, REG_TYPE, REG_VELOCITY,
};
use crate::setpoint::SetpointType;

/// 关闭时发送的停止指令
pub const STOP_PROGRAM: &str = "stop program";

/// 控制周期（秒），与链路的 125Hz 帧率一致
pub const CONTROL_PERIOD: f64 = 0.008;

/// 程序参数
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramConfig {
    /// 工具中心点偏移（x, y, z, rx, ry, rz）
    pub tcp: [f64; 6],
    /// 负载质量（kg）
    pub payload: f64,
    /// 重力向量（m/s²）
    pub gravity: [f64; 3],
    /// 看门狗超时（周期数）
    pub setpoint_timeout: u32,
    /// 控制周期（秒）
    pub control_period: f64,
    /// 链路侧看门狗的最低更新频率（Hz）
    pub watchdog_frequency: f64,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            tcp: [0.0, 0.0, 0.04, 0.0, 0.0, 0.0],
            payload: 0.9,
            gravity: [0.0, 0.0, 9.81],
            setpoint_timeout: 20,
            control_period: CONTROL_PERIOD,
            watchdog_frequency: 1.0,
        }
    }
}

/// 生成机械臂端程序文本
pub fn render_program(config: &ProgramConfig) -> String {
    let tcp = &config.tcp;
    let gravity = &config.gravity;
    format!(
        r#"{stop}
set unlock protective stop

def rtde_control_loop():

    # constants
    SETPOINT_TIMEOUT  = {timeout}
    SETPOINT_HALT     = {halt}
    SETPOINT_POSITION = {position}
    SETPOINT_VELOCITY = {velocity}
    CONTROL_PERIOD = {period}
    RTDE_WATCHDOG_FREQUENCY = {watchdog}

    # integer registers
    REG_SETPOINT = {reg_setpoint}
    REG_TYPE = {reg_type}

    # double registers
    REG_TARGET = {reg_target}
    REG_VELOCITY = {reg_velocity}
    REG_ACCELERATION = {reg_acceleration}
    REG_LOOKAHEAD = {reg_lookahead}
    REG_GAIN = {reg_gain}

    # I/O configuration
    set_standard_analog_input_domain(0, 1)
    set_standard_analog_input_domain(1, 1)
    set_tool_analog_input_domain(0, 1)
    set_tool_analog_input_domain(1, 1)
    set_analog_outputdomain(0, 0)
    set_analog_outputdomain(1, 0)
    set_tool_voltage(0)
    set_input_actions_to_default()

    # tool configuration
    set_tcp(p[{t0}, {t1}, {t2}, {t3}, {t4}, {t5}])
    set_payload({payload})
    set_gravity([{g0}, {g1}, {g2}])

    setpoint_number = read_input_integer_register(REG_SETPOINT)
    last_setpoint_number = setpoint_number
    missed_setpoints = 0

    rtde_set_watchdog("input_int_register_{reg_setpoint}", RTDE_WATCHDOG_FREQUENCY, "stop")

    while True:
        setpoint_number = read_input_integer_register(REG_SETPOINT)
        if setpoint_number == last_setpoint_number:
            missed_setpoints = missed_setpoints + 1
        else:
            missed_setpoints = 0
        end
        last_setpoint_number = setpoint_number

        if missed_setpoints >= SETPOINT_TIMEOUT:
            popup("setpoint timeout", title="ur-servo", error=True)
            halt
        end

        # echo the setpoint number
        write_output_integer_register(0, setpoint_number)

        target = [0, 0, 0, 0, 0, 0]
        target[0] = read_input_float_register(REG_TARGET + 0)
        target[1] = read_input_float_register(REG_TARGET + 1)
        target[2] = read_input_float_register(REG_TARGET + 2)
        target[3] = read_input_float_register(REG_TARGET + 3)
        target[4] = read_input_float_register(REG_TARGET + 4)
        target[5] = read_input_float_register(REG_TARGET + 5)

        type = read_input_integer_register(REG_TYPE)
        if type == SETPOINT_HALT:
            popup("halt command issued", title="ur-servo", error=True)
            halt
        elif type == SETPOINT_POSITION:
            lookahead = read_input_float_register(REG_LOOKAHEAD)
            gain = read_input_float_register(REG_GAIN)
            # acceleration and velocity arguments are ignored by servoj
            servoj(target, 0, 0, CONTROL_PERIOD, lookahead, gain)
        elif type == SETPOINT_VELOCITY:
            acceleration = read_input_float_register(REG_ACCELERATION)
            speedj(target, acceleration, CONTROL_PERIOD)
        else:
            popup("unknown setpoint type received", title="ur-servo", error=True)
            halt
        end
    end
end
"#,
        stop = STOP_PROGRAM,
        timeout = config.setpoint_timeout,
        halt = SetpointType::Halt.code(),
        position = SetpointType::Position.code(),
        velocity = SetpointType::Velocity.code(),
        period = config.control_period,
        watchdog = config.watchdog_frequency,
        reg_setpoint = REG_SETPOINT,
        reg_type = REG_TYPE,
        reg_target = REG_TARGET,
        reg_velocity = REG_VELOCITY,
        reg_acceleration = REG_ACCELERATION,
        reg_lookahead = REG_LOOKAHEAD,
        reg_gain = REG_GAIN,
        t0 = tcp[0],
        t1 = tcp[1],
        t2 = tcp[2],
        t3 = tcp[3],
        t4 = tcp[4],
        t5 = tcp[5],
        payload = config.payload,
        g0 = gravity[0],
        g1 = gravity[1],
        g2 = gravity[2],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_program() {
        let program = render_program(&ProgramConfig::default());

        assert!(program.starts_with("stop program\n"));
        assert!(program.contains("def rtde_control_loop():"));
        assert!(program.contains("set_tcp(p[0, 0, 0.04, 0, 0, 0])"));
        assert!(program.contains("set_payload(0.9)"));
        assert!(program.contains("set_gravity([0, 0, 9.81])"));
        assert!(program.contains("SETPOINT_TIMEOUT  = 20"));
        assert!(program.contains("CONTROL_PERIOD = 0.008"));
        assert!(program.contains("rtde_set_watchdog(\"input_int_register_0\""));
    }

    #[test]
    fn test_render_uses_register_table() {
        let program = render_program(&ProgramConfig::default());
        assert!(program.contains(&format!("REG_SETPOINT = {}", REG_SETPOINT)));
        assert!(program.contains(&format!("REG_TYPE = {}", REG_TYPE)));
        assert!(program.contains(&format!("REG_LOOKAHEAD = {}", REG_LOOKAHEAD)));
        assert!(program.contains(&format!("REG_GAIN = {}", REG_GAIN)));
        assert!(program.contains("SETPOINT_POSITION = 1"));
        assert!(program.contains("SETPOINT_VELOCITY = 2"));
    }

    #[test]
    fn test_render_custom_tool() {
        let config = ProgramConfig {
            tcp: [0.01, 0.02, 0.15, 0.0, 3.14, 0.0],
            payload: 2.5,
            gravity: [0.0, -9.81, 0.0],
            setpoint_timeout: 50,
            ..Default::default()
        };
        let program = render_program(&config);
        assert!(program.contains("set_tcp(p[0.01, 0.02, 0.15, 0, 3.14, 0])"));
        assert!(program.contains("set_payload(2.5)"));
        assert!(program.contains("set_gravity([0, -9.81, 0])"));
        assert!(program.contains("SETPOINT_TIMEOUT  = 50"));
        // 模板中不应残留未替换的占位符
        assert!(!program.contains('{'));
    }
}
